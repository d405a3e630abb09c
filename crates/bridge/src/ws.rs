//! WebSocket endpoint for bridge clients.
//!
//! Flow:
//! 1. Client connects to `/ws`, optionally with `limit`/`since`/`before`
//!    replay parameters on the URL.
//! 2. The replay slice is drained to the socket, oldest first, then a
//!    pending auth URL is re-announced.
//! 3. The client joins the live broadcast set; inbound frames go through
//!    the hub, outbound frames arrive over a bounded per-client channel
//!    whose writer task is the only place this socket is written.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use gb_protocol::ReplayQuery;

use crate::hub;
use crate::state::{BridgeState, ClientRegistry};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub limit: Option<usize>,
    pub since: Option<i64>,
    pub before: Option<i64>,
}

pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/ws", get(bridge_ws))
        .with_state(state)
}

/// GET /ws — upgrade to WebSocket.
async fn bridge_ws(
    ws: WebSocketUpgrade,
    State(state): State<BridgeState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let replay = ReplayQuery {
        limit: query.limit,
        since: query.since,
        before: query.before,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, replay))
}

async fn handle_socket(socket: WebSocket, state: BridgeState, replay: ReplayQuery) {
    let client_id = Uuid::new_v4();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Replay drains before the client joins the live set, so history
    // arrives in stored order ahead of new events.
    let lines = hub::replay_lines(&state, &replay);
    let replayed = lines.len();
    for line in lines {
        if ws_sink.send(Message::Text(line)).await.is_err() {
            tracing::debug!(client = %client_id, "client left during replay");
            return;
        }
    }
    if let Some(line) = hub::pending_auth_line(&state) {
        if ws_sink.send(Message::Text(line)).await.is_err() {
            return;
        }
    }

    let (tx, mut rx) = ClientRegistry::channel();
    state.clients.register(client_id, tx);
    tracing::info!(
        client = %client_id,
        clients = state.clients.len(),
        replayed,
        "client connected"
    );

    // Writer task: forwards the broadcast channel to the socket.
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if ws_sink.send(Message::Text(line)).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: every inbound text frame goes through the hub.
    while let Some(Ok(message)) = ws_stream.next().await {
        match message {
            Message::Text(text) => hub::on_client_frame(&state, client_id, &text).await,
            Message::Close(_) => break,
            // axum answers WS-level pings automatically.
            _ => {}
        }
    }

    state.clients.remove(&client_id);
    writer.abort();
    tracing::info!(client = %client_id, clients = state.clients.len(), "client disconnected");
}
