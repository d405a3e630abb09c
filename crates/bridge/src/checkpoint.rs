//! Checkpoint hook.
//!
//! When a turn ends with a non-empty modified-file set, the bridge can
//! notify a downstream host so it can snapshot the workspace. The hook
//! is fire-and-forget: failures are logged, never surfaced to clients.

use std::time::Duration;

use gb_domain::config::CheckpointConfig;
use serde_json::json;

/// POST the turn's modified-file set to the configured downstream host.
pub async fn fire(config: &CheckpointConfig, turn: i64, files: &[String]) {
    let payload = json!({
        "sessionId": config.session_id,
        "turn": turn,
        "files": files,
    });

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "cannot build checkpoint HTTP client");
            return;
        }
    };

    let mut request = client.post(&config.url).json(&payload);
    if let Some(secret) = &config.secret {
        request = request.bearer_auth(secret);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => {
            tracing::info!(turn, files = files.len(), "checkpoint hook delivered");
        }
        Ok(response) => {
            tracing::warn!(
                turn,
                status = %response.status(),
                "checkpoint hook rejected"
            );
        }
        Err(e) => {
            tracing::warn!(turn, error = %e, "checkpoint hook failed");
        }
    }
}
