//! Shared bridge state.
//!
//! The turn counter, hidden-mode table, ring buffer, auth gate, session
//! id, and modified-file set are fields of one owning object behind a
//! single mutex. Nothing here is held across an await point; blocking
//! I/O happens outside the lock.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use gb_domain::config::TransformMode;
use gb_domain::{BridgeConfig, HiddenMode};

use crate::ring::EventRing;
use crate::tagparse::TagParser;

/// Outbound channel depth per client. A client that cannot drain this
/// many frames is dropped with a diagnostic rather than stalling the
/// broadcast path.
const CLIENT_CHANNEL_DEPTH: usize = 256;

/// Mutable state guarded by the bridge mutex.
pub struct Shared {
    /// Monotonic turn counter, scoped to the subprocess lifetime.
    pub turn: i64,
    /// Hidden mode per turn id.
    pub hidden: HashMap<i64, HiddenMode>,
    /// Replayable event history.
    pub ring: EventRing,
    /// `Some(url)` while the agent is waiting for an OAuth code.
    pub auth_url: Option<String>,
    /// Downstream session id, observed from `session/new` responses.
    pub session_id: Option<String>,
    /// Files written through the emulated fs tools this turn.
    pub modified: BTreeSet<PathBuf>,
    /// Outgoing transform, `None` when the mode is `raw` pass-through.
    pub transform: Option<TagParser>,
}

impl Shared {
    /// Hidden mode of the current turn.
    pub fn current_hidden(&self) -> HiddenMode {
        self.hidden.get(&self.turn).copied().unwrap_or_default()
    }

    /// Drop hidden-table entries older than the oldest retained turn.
    pub fn prune_hidden(&mut self) {
        if let Some(oldest) = self.ring.oldest_turn() {
            self.hidden.retain(|turn, _| *turn >= oldest);
        }
    }
}

/// Cloneable handle to everything the bridge tasks share.
#[derive(Clone)]
pub struct BridgeState {
    pub config: Arc<BridgeConfig>,
    /// Canonicalized project root, resolved once at startup.
    pub project_root: Arc<PathBuf>,
    shared: Arc<Mutex<Shared>>,
    pub clients: Arc<ClientRegistry>,
    /// Sender feeding the single stdin-writer task; `None` while the
    /// subprocess is down.
    stdin: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    listener_live: Arc<AtomicBool>,
}

impl BridgeState {
    pub fn new(config: Arc<BridgeConfig>, project_root: PathBuf) -> Self {
        let transform = match config.transform.mode {
            TransformMode::Raw => None,
            _ => Some(TagParser::new(&config.transform)),
        };
        let shared = Shared {
            turn: 0,
            hidden: HashMap::new(),
            ring: EventRing::new(config.workspace.history_capacity),
            auth_url: None,
            session_id: None,
            modified: BTreeSet::new(),
            transform,
        };
        Self {
            config,
            project_root: Arc::new(project_root),
            shared: Arc::new(Mutex::new(shared)),
            clients: Arc::new(ClientRegistry::default()),
            stdin: Arc::new(RwLock::new(None)),
            listener_live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Run `f` with the shared state locked.
    pub fn with_shared<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        f(&mut self.shared.lock())
    }

    pub fn set_stdin(&self, tx: Option<mpsc::Sender<String>>) {
        *self.stdin.write() = tx;
    }

    /// Queue one line for the stdin-writer task. Returns false when the
    /// subprocess is down.
    pub async fn write_stdin(&self, line: String) -> bool {
        let tx = self.stdin.read().clone();
        match tx {
            Some(tx) => tx.send(line).await.is_ok(),
            None => false,
        }
    }

    pub fn listener_live(&self) -> bool {
        self.listener_live.load(Ordering::Acquire)
    }

    pub fn shutdown_listener(&self) {
        self.listener_live.store(false, Ordering::Release);
    }

    /// Reset per-subprocess state when the agent is replaced: session id,
    /// auth gate, turn counter, hidden table, ring, modified set, and
    /// transform in-flight state.
    pub fn reset_for_restart(&self) {
        self.with_shared(|shared| {
            shared.turn = 0;
            shared.hidden.clear();
            shared.ring.clear();
            shared.auth_url = None;
            shared.session_id = None;
            shared.modified.clear();
            if let Some(parser) = shared.transform.as_mut() {
                let _ = parser.flush();
            }
        });
        self.set_stdin(None);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connected WebSocket clients, each with a bounded outbound channel.
/// The per-client writer task is the only place that touches the
/// socket, so writes are serialized per client.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<Uuid, mpsc::Sender<String>>>,
}

impl ClientRegistry {
    pub fn channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(CLIENT_CHANNEL_DEPTH)
    }

    pub fn register(&self, id: Uuid, tx: mpsc::Sender<String>) {
        self.clients.write().insert(id, tx);
    }

    pub fn remove(&self, id: &Uuid) {
        self.clients.write().remove(id);
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Fan one wire line out to every client, except `skip` if given.
    /// Clients whose channel is full or closed are dropped.
    pub fn broadcast(&self, wire: &str, skip: Option<Uuid>) {
        let mut dead: Vec<Uuid> = Vec::new();
        {
            let clients = self.clients.read();
            for (id, tx) in clients.iter() {
                if Some(*id) == skip {
                    continue;
                }
                if let Err(e) = tx.try_send(wire.to_owned()) {
                    match e {
                        mpsc::error::TrySendError::Full(_) => {
                            tracing::warn!(client = %id, "client cannot keep up, dropping it");
                        }
                        mpsc::error::TrySendError::Closed(_) => {
                            tracing::debug!(client = %id, "client channel closed");
                        }
                    }
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            let mut clients = self.clients.write();
            for id in dead {
                clients.remove(&id);
            }
        }
    }
}
