use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gb_bridge::cli::{Cli, Command, ServeArgs};
use gb_bridge::state::BridgeState;
use gb_bridge::{logfile, supervisor, ws};
use gb_domain::{BridgeConfig, ConfigSeverity};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None => run_server(ServeArgs::default()).await,
        Some(Command::Serve(args)) => run_server(args).await,
        Some(Command::Version) => {
            println!("gembridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = gb_bridge::cli::load_config(&args)?;

    // ── Project root (canonical, resolved once) ──────────────────────
    let project_root = config
        .workspace
        .project_root
        .canonicalize()
        .with_context(|| {
            format!(
                "resolving project root '{}'",
                config.workspace.project_root.display()
            )
        })?;

    // ── Rolling log (rotate, then open; unwritable directory is fatal) ──
    let log_path = project_root.join(&config.log.file);
    let rotated = logfile::rotate_if_large(&log_path, config.log.max_bytes)
        .with_context(|| format!("rotating log file '{}'", log_path.display()))?;
    let log_file = logfile::open_append(&log_path)
        .with_context(|| format!("opening log file '{}'", log_path.display()))?;
    init_tracing(log_file);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gembridge starting");
    tracing::info!(path = %project_root.display(), "project root resolved");
    if rotated {
        tracing::info!(path = %log_path.display(), "log file rotated to .old sibling");
    }

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let config: Arc<BridgeConfig> = Arc::new(config);
    let state = BridgeState::new(config.clone(), project_root);

    // ── Agent supervisor ─────────────────────────────────────────────
    let supervisor_task = tokio::spawn(supervisor::run(state.clone()));
    tracing::info!("agent supervisor started");

    // ── WebSocket listener ───────────────────────────────────────────
    let app = ws::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(256));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "gembridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .context("server error")?;

    // The listener is down: stop respawning and tear the agent down.
    state.shutdown_listener();
    supervisor_task.abort();
    tracing::info!("gembridge stopped");
    Ok(())
}

async fn shutdown_signal(state: BridgeState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
    state.shutdown_listener();
}

/// Tracing goes to stderr for operators and, without ANSI color, to the
/// rolling log file in the project root.
fn init_tracing(log_file: std::fs::File) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gb_bridge=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();
}
