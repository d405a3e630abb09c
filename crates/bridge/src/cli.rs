//! Command line interface and config loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use gb_domain::BridgeConfig;

/// gembridge — a multi-client bridge for the Gemini CLI agent.
#[derive(Debug, Parser)]
#[command(name = "gembridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the bridge server (default when no subcommand is given).
    Serve(ServeArgs),
    /// Print version information.
    Version,
}

#[derive(Debug, Args, Default)]
pub struct ServeArgs {
    /// Path to a TOML config file (default: ./gembridge.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Listen port override.
    #[arg(long)]
    pub port: Option<u16>,
    /// Project root override.
    #[arg(long)]
    pub project_root: Option<PathBuf>,
    /// Absolute path to the agent binary.
    #[arg(long)]
    pub gemini_bin: Option<PathBuf>,
    /// Model identifier handed to the agent.
    #[arg(long)]
    pub model: Option<String>,
}

const DEFAULT_CONFIG_FILE: &str = "gembridge.toml";

/// Load the config file (explicit path, or the default file when it
/// exists) and apply CLI overrides on top.
pub fn load_config(args: &ServeArgs) -> anyhow::Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => BridgeConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root) = &args.project_root {
        config.workspace.project_root = root.clone();
    }
    if let Some(bin) = &args.gemini_bin {
        config.agent.bin = Some(bin.clone());
    }
    if let Some(model) = &args.model {
        config.agent.model = Some(model.clone());
    }

    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            port = 5000

            [agent]
            model = "gemini-2.5-flash"
            "#,
        )
        .unwrap();

        let args = ServeArgs {
            config: Some(path),
            port: Some(6000),
            model: None,
            ..Default::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.agent.model.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let args = ServeArgs {
            config: Some(PathBuf::from("/no/such/file.toml")),
            ..Default::default()
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn defaults_without_any_file() {
        let args = ServeArgs::default();
        let config = load_config(&args).unwrap();
        assert_eq!(config.server.port, 4444);
    }
}
