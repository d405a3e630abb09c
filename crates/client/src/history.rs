//! One-shot historical slice fetch.
//!
//! Opens a short-lived connection with replay parameters, lets the
//! bridge drain its ring, waits for a quiet period, and returns the
//! conversation rebuilt from the replayed frames.

use std::time::Duration;

use gb_domain::Result;
use gb_protocol::ReplayQuery;

use crate::client::{AgentClient, ClientOptions};
use crate::conversation::Conversation;

/// Fetch the retained history from a bridge at `url`.
///
/// Capture ends once `idle_ms` elapses with no event — after the first
/// replay frame, or from connection when nothing is replayed at all.
pub async fn fetch_history(url: &str, query: ReplayQuery, idle_ms: u64) -> Result<Conversation> {
    let options = ClientOptions {
        url: url.to_owned(),
        replay: query,
        handshake: false,
        ..Default::default()
    };
    let (client, mut events) = AgentClient::connect(options);

    let idle = Duration::from_millis(idle_ms.max(1));
    loop {
        match tokio::time::timeout(idle, events.recv()).await {
            // Another event arrived; keep capturing.
            Ok(Some(_)) => continue,
            // Channel closed or quiet period reached: capture is done.
            Ok(None) => break,
            Err(_) => break,
        }
    }

    let conversation = client.conversation();
    client.dispose();
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_bridge_yields_empty_conversation() {
        let conversation = fetch_history(
            "ws://127.0.0.1:1/ws",
            ReplayQuery {
                limit: Some(5),
                ..Default::default()
            },
            50,
        )
        .await
        .unwrap();
        assert!(conversation.is_empty());
    }
}
