//! WebSocket transport with request correlation and auto-reconnect.
//!
//! One background task owns the socket. Outbound frames arrive over a
//! command channel; inbound responses are matched against pending
//! request ids and resolve their oneshot waiters, everything else is
//! forwarded to the frame consumer. On connection loss pending requests
//! reject with a closed-transport error and the task reconnects on a
//! fixed backoff until the transport is disposed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use gb_domain::{Error, Result};
use gb_protocol::{Frame, RequestId};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<serde_json::Value>>>>>;

enum Command {
    Send(String),
    Dispose,
}

/// Handle to the connection task.
pub struct Transport {
    cmd_tx: mpsc::UnboundedSender<Command>,
    pending: PendingMap,
    next_id: AtomicI64,
    disposed: Arc<AtomicBool>,
}

impl Transport {
    /// Connect to `url` in the background. Inbound frames that are not
    /// responses to our requests are delivered on `incoming_tx`.
    pub fn connect(url: String, incoming_tx: mpsc::UnboundedSender<String>) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let disposed = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(connection_loop(
            url,
            incoming_tx,
            cmd_rx,
            pending.clone(),
            disposed.clone(),
        ));

        Self {
            cmd_tx,
            pending,
            next_id: AtomicI64::new(1),
            disposed,
        }
    }

    /// Send a request and await its response's result value.
    pub async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = Frame::request(id, method, params);
        if self.cmd_tx.send(Command::Send(frame.to_wire())).is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::Closed);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Closed),
        }
    }

    /// Send a notification.
    pub fn notify(&self, method: &str, params: serde_json::Value) -> Result<()> {
        self.send_frame(&Frame::notification(method, params))
    }

    /// Send an arbitrary frame (used for responses we originate, e.g.
    /// permission outcomes).
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        self.cmd_tx
            .send(Command::Send(frame.to_wire()))
            .map_err(|_| Error::Closed)
    }

    /// Stop reconnecting, close the socket, and reject everything
    /// still pending.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let _ = self.cmd_tx.send(Command::Dispose);
        reject_pending(&self.pending);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

fn reject_pending(pending: &PendingMap) {
    let waiters: Vec<_> = {
        let mut map = pending.lock();
        map.drain().map(|(_, tx)| tx).collect()
    };
    for tx in waiters {
        let _ = tx.send(Err(Error::Closed));
    }
}

async fn connection_loop(
    url: String,
    incoming_tx: mpsc::UnboundedSender<String>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    pending: PendingMap,
    disposed: Arc<AtomicBool>,
) {
    loop {
        if disposed.load(Ordering::Acquire) {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                tracing::debug!(url = %url, "transport connected");
                let (mut sink, mut read) = stream.split();
                loop {
                    tokio::select! {
                        command = cmd_rx.recv() => match command {
                            Some(Command::Send(line)) => {
                                if sink.send(Message::Text(line)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Command::Dispose) | None => {
                                let _ = sink.send(Message::Close(None)).await;
                                reject_pending(&pending);
                                return;
                            }
                        },
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                dispatch_incoming(&text, &pending, &incoming_tx);
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                tracing::debug!(error = %e, "transport read error");
                                break;
                            }
                            Some(Ok(_)) => {}
                        },
                    }
                }
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "transport connect failed");
            }
        }

        // Connection lost mid-flight: everything pending rejects.
        reject_pending(&pending);
        if disposed.load(Ordering::Acquire) {
            break;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Resolve responses to our own requests; forward everything else.
fn dispatch_incoming(text: &str, pending: &PendingMap, incoming_tx: &mpsc::UnboundedSender<String>) {
    if let Ok(Frame::Response { id, result, error }) = Frame::parse(text) {
        if let RequestId::Num(n) = id {
            if let Some(waiter) = pending.lock().remove(&n) {
                let outcome = match error {
                    Some(e) => Err(Error::Agent(e.to_string())),
                    None => Ok(result.unwrap_or(serde_json::Value::Null)),
                };
                let _ = waiter.send(outcome);
                return;
            }
        }
        // A response for someone else's request (responses are broadcast
        // to every client); nothing to do with it.
        tracing::trace!("ignoring unmatched response");
        return;
    }
    let _ = incoming_tx.send(text.to_owned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unmatched_response_is_swallowed() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatch_incoming(
            r#"{"jsonrpc":"2.0","id":99,"result":{}}"#,
            &pending,
            &tx,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn matched_response_resolves_waiter() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (otx, mut orx) = oneshot::channel();
        pending.lock().insert(7, otx);
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch_incoming(
            r#"{"jsonrpc":"2.0","id":7,"result":{"sessionId":"s"}}"#,
            &pending,
            &tx,
        );
        let value = orx.try_recv().unwrap().unwrap();
        assert_eq!(value, json!({"sessionId": "s"}));
        assert!(rx.try_recv().is_err());
        assert!(pending.lock().is_empty());
    }

    #[test]
    fn error_response_rejects_waiter() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (otx, mut orx) = oneshot::channel();
        pending.lock().insert(3, otx);
        let (tx, _rx) = mpsc::unbounded_channel();

        dispatch_incoming(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"disk"}}"#,
            &pending,
            &tx,
        );
        assert!(orx.try_recv().unwrap().is_err());
    }

    #[test]
    fn notifications_are_forwarded() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let wire = r#"{"jsonrpc":"2.0","method":"session/update","params":{}}"#;
        dispatch_incoming(wire, &pending, &tx);
        assert_eq!(rx.try_recv().unwrap(), wire);
    }

    #[tokio::test]
    async fn disposed_transport_rejects_requests() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Transport::connect("ws://127.0.0.1:1/ws".into(), tx);
        transport.dispose();
        let err = transport.request("session/new", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn dispose_rejects_in_flight_request() {
        // Nothing listens on this port; the request parks in pending
        // until dispose rejects it.
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Transport::connect("ws://127.0.0.1:1/ws".into(), tx));

        let requester = transport.clone();
        let pending_request =
            tokio::spawn(async move { requester.request("session/new", json!({})).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        transport.dispose();

        let outcome = pending_request.await.unwrap();
        assert!(matches!(outcome, Err(Error::Closed)));
    }
}
