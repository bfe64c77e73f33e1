// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmux driving. Every invocation is an argv array (never a shell line),
//! bounded by a per-call timeout. Session names are derived from terminal
//! ids, not user-supplied.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Reserved prefix for sessions owned by the agent.
pub const SESSION_PREFIX: &str = "tc2-";

/// Ceiling on captured history; larger captures keep the tail.
const CAPTURE_CEILING: usize = 10 * 1024 * 1024;

const LIST_TIMEOUT: Duration = Duration::from_secs(3);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Session name for a terminal id.
pub fn session_name(terminal_id: &str) -> String {
    format!("{SESSION_PREFIX}{terminal_id}")
}

/// Terminal id for a reserved-prefix session name, if it has the prefix.
pub fn terminal_id(session: &str) -> Option<&str> {
    session.strip_prefix(SESSION_PREFIX)
}

/// One pane row from the batch listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub session_name: String,
    pub current_command: String,
    pub current_path: String,
    pub is_active: bool,
    pub pane_pid: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Tmux {
    /// Optional `-S <socket>` override, used by tests to address an
    /// isolated tmux server.
    socket: Option<PathBuf>,
}

impl Tmux {
    pub fn new() -> Self {
        Self { socket: None }
    }

    pub fn with_socket(socket: PathBuf) -> Self {
        Self { socket: Some(socket) }
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("tmux");
        if let Some(ref s) = self.socket {
            cmd.arg("-S").arg(s);
        }
        cmd.stdin(std::process::Stdio::null());
        cmd
    }

    async fn run(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> anyhow::Result<std::process::Output> {
        let mut cmd = self.command();
        cmd.args(args);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("tmux {} timed out", args.first().unwrap_or(&"")))??;
        Ok(output)
    }

    async fn run_ok(&self, args: &[&str], timeout: Duration) -> anyhow::Result<()> {
        let output = self.run(args, timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
        }
        Ok(())
    }

    /// All session names on the server (empty when the server is down).
    pub async fn list_sessions(&self) -> anyhow::Result<Vec<String>> {
        let output =
            self.run(&["list-sessions", "-F", "#{session_name}"], LIST_TIMEOUT).await?;
        if !output.status.success() {
            // No server running is indistinguishable from no sessions.
            return Ok(vec![]);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .filter(|l| !l.is_empty())
            .collect())
    }

    pub async fn has_session(&self, session: &str) -> bool {
        self.run(&["has-session", "-t", session], LIST_TIMEOUT)
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub async fn new_session(
        &self,
        session: &str,
        working_dir: &str,
        cols: u16,
        rows: u16,
    ) -> anyhow::Result<()> {
        self.run_ok(
            &[
                "new-session",
                "-d",
                "-s",
                session,
                "-c",
                working_dir,
                "-x",
                &cols.to_string(),
                "-y",
                &rows.to_string(),
            ],
            CONTROL_TIMEOUT,
        )
        .await
    }

    pub async fn kill_session(&self, session: &str) -> anyhow::Result<()> {
        self.run_ok(&["kill-session", "-t", session], CONTROL_TIMEOUT).await
    }

    pub async fn resize_window(&self, session: &str, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.run_ok(
            &[
                "resize-window",
                "-t",
                session,
                "-x",
                &cols.to_string(),
                "-y",
                &rows.to_string(),
            ],
            CONTROL_TIMEOUT,
        )
        .await
    }

    /// Scrollback from session start up to, but excluding, the visible
    /// screen, with ANSI escapes preserved.
    pub async fn capture_history(&self, session: &str) -> anyhow::Result<String> {
        let output = self
            .run(
                &["capture-pane", "-p", "-e", "-t", session, "-S", "-", "-E", "-1"],
                CAPTURE_TIMEOUT,
            )
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux capture-pane failed: {}", stderr.trim());
        }
        let mut bytes = output.stdout;
        if bytes.len() > CAPTURE_CEILING {
            let start = bytes.len() - CAPTURE_CEILING;
            bytes.drain(..start);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The visible screen, plain text (for state classification).
    pub async fn capture_screen(&self, session: &str) -> anyhow::Result<String> {
        let output =
            self.run(&["capture-pane", "-p", "-t", session], CAPTURE_TIMEOUT).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux capture-pane failed: {}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// One batch query listing every pane with the fields the detector
    /// needs.
    pub async fn list_panes(&self) -> anyhow::Result<Vec<PaneInfo>> {
        let format = "#{session_name}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_active}\t#{pane_pid}";
        let output = self.run(&["list-panes", "-a", "-F", format], LIST_TIMEOUT).await?;
        if !output.status.success() {
            return Ok(vec![]);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_pane_listing(&text))
    }

    /// Scroll the session's copy-mode by `lines` (positive = up into
    /// history). Enters copy-mode with auto-exit on reaching the bottom.
    pub async fn scroll(&self, session: &str, lines: i32) -> anyhow::Result<()> {
        if lines == 0 {
            return Ok(());
        }
        let up = lines > 0;
        let count = lines.unsigned_abs();
        self.run_ok(&["copy-mode", "-e", "-t", session], CONTROL_TIMEOUT).await?;
        let key = if up { "scroll-up" } else { "scroll-down" };
        for _ in 0..count {
            if let Err(e) = self
                .run_ok(&["send-keys", "-t", session, "-X", key], CONTROL_TIMEOUT)
                .await
            {
                warn!(session, err = %e, "copy-mode scroll interrupted");
                break;
            }
        }
        Ok(())
    }
}

/// Parse `list-panes` tab-separated output. Malformed rows are skipped.
pub fn parse_pane_listing(text: &str) -> Vec<PaneInfo> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let session_name = parts.next()?.to_owned();
            let current_command = parts.next()?.to_owned();
            let current_path = parts.next()?.to_owned();
            let is_active = parts.next()? == "1";
            let pane_pid = parts.next()?.parse().ok()?;
            Some(PaneInfo { session_name, current_command, current_path, is_active, pane_pid })
        })
        .collect()
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
