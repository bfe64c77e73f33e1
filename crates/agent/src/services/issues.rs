// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issues CLI proxy (`bd`). Ids are validated before any subprocess call;
//! arguments are always passed as an argv array.

use std::path::Path;
use std::time::Duration;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const MUTATE_TIMEOUT: Duration = Duration::from_secs(15);

/// Issue types accepted on creation.
pub const ISSUE_TYPES: &[&str] = &["task", "bug", "feature"];

/// Strict issue-id check: `[A-Za-z0-9_-]+` only.
pub fn valid_issue_id(id: &str) -> bool {
    !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

async fn run_bd(
    dir: &Path,
    args: &[&str],
    timeout: Duration,
) -> anyhow::Result<serde_json::Value> {
    let mut cmd = tokio::process::Command::new("bd");
    cmd.current_dir(dir).args(args);
    cmd.stdin(std::process::Stdio::null());
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("bd {} timed out", args.first().unwrap_or(&"")))??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("bd {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(stdout.trim())?)
}

pub async fn list(dir: &Path) -> anyhow::Result<serde_json::Value> {
    run_bd(dir, &["list", "--json"], LIST_TIMEOUT).await
}

/// Create an issue. `title` is required; `issue_type` and `priority` are
/// validated against the closed sets.
pub async fn create(
    dir: &Path,
    title: &str,
    issue_type: &str,
    priority: u8,
) -> anyhow::Result<serde_json::Value> {
    if title.trim().is_empty() {
        anyhow::bail!("title is required");
    }
    if !ISSUE_TYPES.contains(&issue_type) {
        anyhow::bail!("type must be one of task, bug, feature");
    }
    if priority > 4 {
        anyhow::bail!("priority must be 0..4");
    }
    run_bd(
        dir,
        &[
            "create",
            title,
            "--type",
            issue_type,
            "--priority",
            &priority.to_string(),
            "--json",
        ],
        MUTATE_TIMEOUT,
    )
    .await
}

/// Close an issue by id. The id is validated before any subprocess call.
pub async fn close(dir: &Path, id: &str) -> anyhow::Result<serde_json::Value> {
    if !valid_issue_id(id) {
        anyhow::bail!("invalid issue id");
    }
    run_bd(dir, &["close", id, "--json"], MUTATE_TIMEOUT).await
}

#[cfg(test)]
#[path = "issues_tests.rs"]
mod tests;
