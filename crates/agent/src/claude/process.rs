// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-tree detection: is a pane's foreground process the Claude CLI?
//!
//! The pane command usually says so directly; on platforms where the shell
//! stays registered as the foreground process, the pane pid's descendants
//! are searched instead.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static CLAUDE_CMD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)^claude$").ok());
static CLAUDE_ARGS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)claude").ok());

/// Whether a pane's `current_command` is the Claude CLI itself.
pub fn is_claude_command(command: &str) -> bool {
    CLAUDE_CMD_RE.as_ref().map(|re| re.is_match(command)).unwrap_or(false)
}

/// Snapshot of the host process table, one batch `ps` per detector pass.
#[derive(Debug, Default)]
pub struct ProcessTable {
    children: HashMap<u32, Vec<u32>>,
    args: HashMap<u32, String>,
}

impl ProcessTable {
    /// Capture the current table. Failure yields an empty table (detection
    /// falls back to the pane command alone).
    pub async fn snapshot() -> Self {
        let mut cmd = tokio::process::Command::new("ps");
        cmd.args(["-Ao", "pid=,ppid=,args="]);
        cmd.stdin(std::process::Stdio::null());
        let output = match tokio::time::timeout(Duration::from_secs(3), cmd.output()).await {
            Ok(Ok(o)) if o.status.success() => o,
            _ => return Self::default(),
        };
        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse `ps -Ao pid=,ppid=,args=` output.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let Some(pid) = parts.next().and_then(|p| p.parse::<u32>().ok()) else { continue };
            let Some(ppid) = parts.next().and_then(|p| p.parse::<u32>().ok()) else { continue };
            let args = parts.collect::<Vec<_>>().join(" ");
            table.children.entry(ppid).or_default().push(pid);
            table.args.insert(pid, args);
        }
        table
    }

    /// Search `root`'s descendants for a command line matching the Claude
    /// CLI. Returns `(pid, command line)`.
    pub fn find_claude_descendant(&self, root: u32) -> Option<(u32, String)> {
        let re = CLAUDE_ARGS_RE.as_ref()?;
        let mut queue: Vec<u32> = self.children.get(&root).cloned().unwrap_or_default();
        let mut seen = 0usize;
        while let Some(pid) = queue.pop() {
            // Bounded walk; a runaway tree should not stall the pass.
            seen += 1;
            if seen > 512 {
                break;
            }
            if let Some(args) = self.args.get(&pid) {
                if re.is_match(args) {
                    return Some((pid, args.clone()));
                }
            }
            if let Some(kids) = self.children.get(&pid) {
                queue.extend(kids.iter().copied());
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
