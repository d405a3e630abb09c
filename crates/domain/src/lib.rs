//! Shared domain types for the gembridge workspace: configuration,
//! the common error type, and the per-turn hidden mode.

pub mod config;
pub mod error;
pub mod hidden;

pub use config::{BridgeConfig, ConfigIssue, ConfigSeverity};
pub use error::{Error, Result};
pub use hidden::HiddenMode;

/// Milliseconds since the Unix epoch, the timestamp unit used on the wire.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
