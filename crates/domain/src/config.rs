use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    /// Optional downstream checkpoint hook, fired at end of turn when the
    /// turn modified files through the emulated fs tools.
    #[serde(default)]
    pub checkpoint: Option<CheckpointConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent subprocess
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Absolute path to the agent binary. When unset, the launcher probes
    /// the workspace-local install and `PATH` before falling back to the
    /// package runner.
    #[serde(default)]
    pub bin: Option<PathBuf>,
    /// Package name for the `npx` fallback.
    #[serde(default = "d_package")]
    pub package: String,
    /// Model identifier handed to the agent on session creation.
    #[serde(default)]
    pub model: Option<String>,
    /// Approval mode string forwarded to the agent (e.g. "default",
    /// "auto_edit", "yolo").
    #[serde(default)]
    pub approval_mode: Option<String>,
    /// Delay before respawning a crashed agent, in milliseconds.
    #[serde(default = "d_restart_ms")]
    pub restart_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bin: None,
            package: d_package(),
            model: None,
            approval_mode: None,
            restart_delay_ms: d_restart_ms(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Project root. Canonicalized at startup; the agent's working
    /// directory and the containment root for emulated fs tools.
    #[serde(default = "d_root")]
    pub project_root: PathBuf,
    /// Ring buffer capacity (event records retained for replay).
    #[serde(default = "d_ring")]
    pub history_capacity: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            project_root: d_root(),
            history_capacity: d_ring(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outgoing transform
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How embedded `<TAG>…</TAG>` regions in the assistant text stream are
/// handled on their way out to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Strip tag regions from the text, emit structured events in position.
    #[default]
    Event,
    /// Pass the stream through untouched; no capture.
    Raw,
    /// Emit structured events and keep the raw tagged text in the stream.
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub mode: TransformMode,
    #[serde(default = "d_json_tag")]
    pub json_tag: String,
    #[serde(default = "d_block_tag")]
    pub block_tag: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            mode: TransformMode::Event,
            json_tag: d_json_tag(),
            block_tag: d_block_tag(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Checkpoint hook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Downstream host URL the hook POSTs to.
    pub url: String,
    /// Downstream session identifier included in the payload.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Shared secret sent as a bearer token.
    #[serde(default)]
    pub secret: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rolling log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file name, created inside the project root.
    #[serde(default = "d_log_file")]
    pub file: String,
    /// Rotate to a `.old` sibling once the file exceeds this size.
    #[serde(default = "d_log_max")]
    pub max_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: d_log_file(),
            max_bytes: d_log_max(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl BridgeConfig {
    /// Check the configuration for problems. Errors abort startup;
    /// warnings are logged and ignored.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "server.port must be non-zero".into(),
            });
        }

        if !self.workspace.project_root.exists() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: format!(
                    "workspace.project_root '{}' does not exist",
                    self.workspace.project_root.display()
                ),
            });
        }

        if self.workspace.history_capacity == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "workspace.history_capacity must be at least 1".into(),
            });
        }

        if self.transform.json_tag.is_empty() || self.transform.block_tag.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "transform tag names must be non-empty".into(),
            });
        }
        if self.transform.json_tag == self.transform.block_tag {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "transform.json_tag and transform.block_tag must differ".into(),
            });
        }

        if let Some(cp) = &self.checkpoint {
            if cp.url.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    message: "checkpoint.url must be non-empty when [checkpoint] is present".into(),
                });
            }
            if cp.secret.is_none() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    message: "checkpoint.secret is unset — hook requests will be unauthenticated"
                        .into(),
                });
            }
        }

        if let Some(bin) = &self.agent.bin {
            if !bin.is_absolute() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    message: format!(
                        "agent.bin '{}' is not absolute — resolution depends on the launch cwd",
                        bin.display()
                    ),
                });
            }
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    4444
}
fn d_package() -> String {
    "@google/gemini-cli".into()
}
fn d_restart_ms() -> u64 {
    2_000
}
fn d_root() -> PathBuf {
    PathBuf::from(".")
}
fn d_ring() -> usize {
    2_000
}
fn d_json_tag() -> String {
    "SYS_JSON".into()
}
fn d_block_tag() -> String {
    "SYS_BLOCK".into()
}
fn d_log_file() -> String {
    "gembridge.log".into()
}
fn d_log_max() -> u64 {
    2 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.port, 4444);
        assert_eq!(config.workspace.history_capacity, 2_000);
        assert_eq!(config.transform.mode, TransformMode::Event);
        assert_eq!(config.transform.json_tag, "SYS_JSON");
        assert_eq!(config.log.max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.agent.package, "@google/gemini-cli");
        assert!(config.checkpoint.is_none());
    }

    #[test]
    fn partial_toml_overrides() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [server]
            port = 5555

            [transform]
            mode = "both"

            [checkpoint]
            url = "http://localhost:9000/hook"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 5555);
        assert_eq!(config.transform.mode, TransformMode::Both);
        assert_eq!(config.checkpoint.unwrap().url, "http://localhost:9000/hook");
    }

    #[test]
    fn validate_flags_zero_port() {
        let mut config = BridgeConfig::default();
        config.server.port = 0;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error && i.message.contains("port")));
    }

    #[test]
    fn validate_flags_missing_root() {
        let mut config = BridgeConfig::default();
        config.workspace.project_root = PathBuf::from("/definitely/not/a/dir");
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn validate_flags_identical_tags() {
        let mut config = BridgeConfig::default();
        config.transform.block_tag = config.transform.json_tag.clone();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.message.contains("must differ")));
    }

    #[test]
    fn validate_warns_on_missing_secret() {
        let mut config = BridgeConfig::default();
        config.checkpoint = Some(CheckpointConfig {
            url: "http://localhost:9000".into(),
            session_id: None,
            secret: None,
        });
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == ConfigSeverity::Warning && i.message.contains("secret")));
    }
}
