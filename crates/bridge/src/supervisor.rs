//! Agent subprocess supervisor.
//!
//! Owns the child process and its stdio plumbing: a single writer task
//! serializes everything going to stdin, the supervisor task consumes
//! stdout line by line through the framer, and a side task drains
//! stderr into the log. On exit the per-subprocess state is cleared and
//! the agent is respawned after a short delay — unless the listener has
//! been shut down.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::framer::{self, LineFrame};
use crate::hub;
use crate::state::BridgeState;

/// Lines that mean the agent's stored credentials are unusable. The
/// subprocess is killed on sight so the restart path clears state.
static AUTH_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)auth\w*[ _-]?(failed|failure|error)").unwrap());

const STDIN_CHANNEL_DEPTH: usize = 256;
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Launch resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub program: String,
    /// Full argument list for the bridged run.
    pub args: Vec<String>,
    /// Argument list for the one-line version probe.
    pub probe_args: Vec<String>,
    /// Set the offline-preferred environment for the package runner.
    pub offline_env: bool,
}

impl LaunchPlan {
    pub fn label(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Pick the agent executable: explicit config path, the workspace-local
/// install, a `PATH` hit, then the package-runner fallback.
pub fn resolve_launch(state: &BridgeState) -> LaunchPlan {
    let agent = &state.config.agent;

    let mut agent_args = vec!["--experimental-acp".to_owned()];
    if let Some(model) = &agent.model {
        agent_args.push("--model".to_owned());
        agent_args.push(model.clone());
    }
    if let Some(mode) = &agent.approval_mode {
        agent_args.push("--approval-mode".to_owned());
        agent_args.push(mode.clone());
    }

    let direct = |program: String| LaunchPlan {
        program,
        args: agent_args.clone(),
        probe_args: vec!["--version".to_owned()],
        offline_env: false,
    };

    if let Some(bin) = &agent.bin {
        return direct(bin.display().to_string());
    }

    let local = state.project_root.join("node_modules/.bin/gemini");
    if local.is_file() {
        return direct(local.display().to_string());
    }

    if let Some(found) = find_in_path("gemini") {
        return direct(found.display().to_string());
    }

    // Package runner fallback, offline-preferred.
    let mut args = vec!["--prefer-offline".to_owned(), agent.package.clone()];
    let mut probe_args = args.clone();
    probe_args.push("--version".to_owned());
    args.extend(agent_args);
    LaunchPlan {
        program: "npx".to_owned(),
        args,
        probe_args,
        offline_env: true,
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Supervise the agent until the listener shuts down.
pub async fn run(state: BridgeState) {
    loop {
        if !state.listener_live() {
            break;
        }

        let plan = resolve_launch(&state);
        tracing::info!(command = %plan.label(), "launching agent");
        probe_version(&plan).await;

        let child = match spawn(&state, &plan) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, command = %plan.label(), "failed to spawn agent");
                if !sleep_before_restart(&state).await {
                    break;
                }
                continue;
            }
        };

        supervise_child(&state, child).await;

        state.reset_for_restart();
        if !sleep_before_restart(&state).await {
            break;
        }
    }
    tracing::info!("agent supervisor stopped");
}

async fn sleep_before_restart(state: &BridgeState) -> bool {
    if !state.listener_live() {
        return false;
    }
    let delay = Duration::from_millis(state.config.agent.restart_delay_ms);
    tracing::info!(delay_ms = delay.as_millis() as u64, "restarting agent shortly");
    tokio::time::sleep(delay).await;
    state.listener_live()
}

fn spawn(state: &BridgeState, plan: &LaunchPlan) -> std::io::Result<Child> {
    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args)
        .current_dir(state.project_root.as_ref())
        .env("FORCE_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if plan.offline_env {
        cmd.env("npm_config_prefer_offline", "true");
    }
    cmd.spawn()
}

async fn probe_version(plan: &LaunchPlan) {
    let probe = tokio::time::timeout(
        VERSION_PROBE_TIMEOUT,
        Command::new(&plan.program)
            .args(&plan.probe_args)
            .stdin(Stdio::null())
            .output(),
    )
    .await;
    match probe {
        Ok(Ok(output)) => {
            let line = String::from_utf8_lossy(&output.stdout);
            let line = line.lines().next().unwrap_or("").trim().to_owned();
            tracing::info!(version = %line, "agent version probe");
        }
        Ok(Err(e)) => tracing::debug!(error = %e, "agent version probe failed"),
        Err(_) => tracing::debug!("agent version probe timed out"),
    }
}

async fn supervise_child(state: &BridgeState, mut child: Child) {
    let Some(stdin) = child.stdin.take() else {
        tracing::error!("agent stdin pipe missing");
        return;
    };
    let Some(stdout) = child.stdout.take() else {
        tracing::error!("agent stdout pipe missing");
        return;
    };
    let Some(stderr) = child.stderr.take() else {
        tracing::error!("agent stderr pipe missing");
        return;
    };

    // Single-writer stdin task: the only place the pipe is written.
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(STDIN_CHANNEL_DEPTH);
    state.set_stdin(Some(stdin_tx));
    let writer = tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(line) = stdin_rx.recv().await {
            if stdin.write_all(line.as_bytes()).await.is_err()
                || stdin.write_all(b"\n").await.is_err()
                || stdin.flush().await.is_err()
            {
                break;
            }
        }
    });

    // Kill requests raised by auth-failure detection.
    let (kill_tx, mut kill_rx) = mpsc::channel::<String>(1);

    // Stderr drain: log lines, watch for auth failures.
    let stderr_state = state.clone();
    let stderr_kill = kill_tx.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = framer::strip_terminal_escapes(line.trim());
            if line.is_empty() {
                continue;
            }
            tracing::debug!(target: "agent_stderr", "{line}");
            if AUTH_FAILURE.is_match(&line) {
                hub::broadcast_auth_failure(&stderr_state, &line);
                let _ = stderr_kill.try_send(line);
            }
        }
    });

    // Main stdout loop.
    let mut lines = BufReader::new(stdout).lines();
    loop {
        tokio::select! {
            next = lines.next_line() => {
                match next {
                    Ok(Some(line)) => handle_stdout_line(state, &line, &kill_tx).await,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "agent stdout read error");
                        break;
                    }
                }
            }
            reason = kill_rx.recv() => {
                if let Some(reason) = reason {
                    tracing::warn!(reason = %reason, "killing agent after auth failure");
                    let _ = child.kill().await;
                }
                break;
            }
        }
    }

    state.set_stdin(None);
    writer.abort();
    stderr_task.abort();

    match child.wait().await {
        Ok(status) => tracing::warn!(%status, "agent exited"),
        Err(e) => tracing::warn!(error = %e, "failed to reap agent"),
    }
}

async fn handle_stdout_line(state: &BridgeState, line: &str, kill_tx: &mpsc::Sender<String>) {
    match framer::classify(line) {
        None => {}
        Some(LineFrame::JsonRpc(frame)) => hub::on_subprocess_frame(state, frame).await,
        Some(LineFrame::AuthUrl(url)) => hub::on_auth_url(state, url).await,
        Some(LineFrame::Log(message)) => {
            tracing::info!(target: "agent", "{message}");
            if AUTH_FAILURE.is_match(&message) {
                hub::broadcast_auth_failure(state, &message);
                let _ = kill_tx.try_send(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_domain::BridgeConfig;
    use std::sync::Arc;

    fn state_with_root(root: PathBuf, bin: Option<PathBuf>) -> BridgeState {
        let mut config = BridgeConfig::default();
        config.agent.bin = bin;
        config.agent.model = Some("gemini-2.5-pro".into());
        BridgeState::new(Arc::new(config), root)
    }

    #[test]
    fn explicit_bin_wins() {
        let state = state_with_root(PathBuf::from("/tmp"), Some(PathBuf::from("/opt/bin/gemini")));
        let plan = resolve_launch(&state);
        assert_eq!(plan.program, "/opt/bin/gemini");
        assert!(plan.args.contains(&"--experimental-acp".to_owned()));
        assert!(plan.args.contains(&"gemini-2.5-pro".to_owned()));
        assert!(!plan.offline_env);
    }

    #[test]
    fn workspace_local_install_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("node_modules/.bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::fs::write(bin_dir.join("gemini"), "#!/bin/sh\n").unwrap();

        let state = state_with_root(dir.path().to_path_buf(), None);
        let plan = resolve_launch(&state);
        assert!(plan.program.ends_with("node_modules/.bin/gemini"));
    }

    #[test]
    fn package_runner_fallback() {
        // Empty root, no explicit bin, and (almost certainly) no global
        // `gemini` on the test machine's PATH.
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_root(dir.path().to_path_buf(), None);
        let plan = resolve_launch(&state);
        if plan.program == "npx" {
            assert!(plan.offline_env);
            assert_eq!(plan.args[0], "--prefer-offline");
            assert_eq!(plan.args[1], "@google/gemini-cli");
            assert!(plan.probe_args.contains(&"--version".to_owned()));
        } else {
            // A real global install is acceptable too.
            assert!(plan.program.ends_with("gemini"));
        }
    }

    #[test]
    fn auth_failure_patterns() {
        assert!(AUTH_FAILURE.is_match("Authentication failed: invalid_grant"));
        assert!(AUTH_FAILURE.is_match("auth error while refreshing token"));
        assert!(AUTH_FAILURE.is_match("OAuth failure"));
        assert!(!AUTH_FAILURE.is_match("authenticated successfully"));
        assert!(!AUTH_FAILURE.is_match("Loaded 3 tools"));
    }

    #[test]
    fn label_joins_command_line() {
        let plan = LaunchPlan {
            program: "gemini".into(),
            args: vec!["--experimental-acp".into()],
            probe_args: vec!["--version".into()],
            offline_env: false,
        };
        assert_eq!(plan.label(), "gemini --experimental-acp");
    }
}
