// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git graph data: branch, working-tree counts, and an enriched HTML
//! rendering of the commit graph.
//!
//! The primary branch is chosen once per render (`main`, else `master`,
//! else the current branch); node coloring and the indicator column derive
//! from that single choice.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

/// Default commit window.
pub const DEFAULT_MAX_COMMITS: usize = 50;

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub branch: String,
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub branch: String,
    pub ahead: usize,
    pub behind: usize,
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
}

async fn run_git(repo: &Path, args: &[&str], timeout: Duration) -> anyhow::Result<String> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    cmd.stdin(std::process::Stdio::null());
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("git {} timed out", args.first().unwrap_or(&"")))??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Fetch branch, counts, and the rendered graph. The independent queries
/// run in parallel.
pub async fn graph_data(repo: &Path, max_commits: usize) -> anyhow::Result<GraphData> {
    let max = max_commits.clamp(1, 500).to_string();
    let graph_args = [
        "log",
        "--graph",
        "--color=always",
        "--decorate=short",
        "--format=%C(auto)%h%d %s",
        "-n",
        &max,
    ];
    let meta_args = ["log", "--format=%h %ct", "-n", &max];
    let (branch, status, graph, meta, branches) = tokio::join!(
        run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"], QUERY_TIMEOUT),
        run_git(repo, &["status", "--porcelain"], QUERY_TIMEOUT),
        run_git(repo, &graph_args, QUERY_TIMEOUT),
        run_git(repo, &meta_args, QUERY_TIMEOUT),
        run_git(repo, &["branch", "--format=%(refname:short)"], QUERY_TIMEOUT),
    );

    let branch = branch?.trim().to_owned();
    let counts = count_porcelain(&status.unwrap_or_default());
    let graph = graph?;

    let branch_list: Vec<String> =
        branches.unwrap_or_default().lines().map(str::to_owned).collect();
    let primary = choose_primary_branch(&branch_list, &branch);

    let ages = parse_hash_ages(&meta.unwrap_or_default());
    let primary_set = rev_set(repo, &primary, &max).await;
    let ahead_set = rev_set(repo, &format!("origin/{primary}..{primary}"), &max).await;
    let behind_set = rev_set(repo, &format!("{primary}..origin/{primary}"), &max).await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let html = render_graph_html(&graph, &ages, &primary_set, &ahead_set, &behind_set, now);

    Ok(GraphData {
        branch,
        staged: counts.0,
        unstaged: counts.1,
        untracked: counts.2,
        html,
    })
}

async fn rev_set(repo: &Path, range: &str, max: &str) -> HashSet<String> {
    run_git(repo, &["rev-list", "--abbrev-commit", "-n", max, range], QUERY_TIMEOUT)
        .await
        .map(|out| out.lines().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// `git push` with a long timeout; the remote's message goes back verbatim.
pub async fn push(repo: &Path) -> anyhow::Result<String> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("-C").arg(repo).arg("push");
    cmd.stdin(std::process::Stdio::null());
    let output = tokio::time::timeout(PUSH_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow::anyhow!("git push timed out"))??;
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        anyhow::bail!("git push failed: {}", stderr.trim());
    }
    Ok(stderr.trim().to_owned())
}

/// Porcelain v1 summary with branch tracking info.
pub async fn status_summary(repo: &Path) -> anyhow::Result<StatusSummary> {
    let output = run_git(repo, &["status", "--porcelain=v1", "-b"], QUERY_TIMEOUT).await?;
    Ok(parse_status_summary(&output))
}

pub fn parse_status_summary(output: &str) -> StatusSummary {
    let mut summary = StatusSummary {
        branch: String::new(),
        ahead: 0,
        behind: 0,
        staged: 0,
        unstaged: 0,
        untracked: 0,
    };
    let mut rest = String::new();
    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            let name = header.split("...").next().unwrap_or(header);
            summary.branch = name.trim().to_owned();
            if let Some(idx) = header.find("ahead ") {
                summary.ahead = header[idx + 6..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0);
            }
            if let Some(idx) = header.find("behind ") {
                summary.behind = header[idx + 7..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0);
            }
        } else {
            rest.push_str(line);
            rest.push('\n');
        }
    }
    let (staged, unstaged, untracked) = count_porcelain(&rest);
    summary.staged = staged;
    summary.unstaged = unstaged;
    summary.untracked = untracked;
    summary
}

/// Count (staged, unstaged, untracked) entries of porcelain v1 output.
pub fn count_porcelain(output: &str) -> (usize, usize, usize) {
    let mut staged = 0;
    let mut unstaged = 0;
    let mut untracked = 0;
    for line in output.lines() {
        let mut chars = line.chars();
        let (Some(x), Some(y)) = (chars.next(), chars.next()) else { continue };
        if x == '?' && y == '?' {
            untracked += 1;
            continue;
        }
        if x != ' ' && x != '?' {
            staged += 1;
        }
        if y != ' ' && y != '?' {
            unstaged += 1;
        }
    }
    (staged, unstaged, untracked)
}

/// Deterministic primary-branch choice: `main`, else `master`, else the
/// current branch.
pub fn choose_primary_branch(branches: &[String], current: &str) -> String {
    if branches.iter().any(|b| b == "main") {
        "main".to_owned()
    } else if branches.iter().any(|b| b == "master") {
        "master".to_owned()
    } else {
        current.to_owned()
    }
}

/// `%h %ct` lines -> hash -> commit epoch seconds.
pub fn parse_hash_ages(meta: &str) -> HashMap<String, i64> {
    meta.lines()
        .filter_map(|line| {
            let (hash, ts) = line.split_once(' ')?;
            Some((hash.to_owned(), ts.trim().parse().ok()?))
        })
        .collect()
}

/// Compact relative age: under a minute reads as `1m`, then minutes,
/// hours, days.
pub fn relative_age(now: i64, commit: i64) -> String {
    let delta = (now - commit).max(0);
    if delta < 60 {
        "1m".to_owned()
    } else if delta < 3600 {
        format!("{}m", delta / 60)
    } else if delta < 86400 {
        format!("{}h", delta / 3600)
    } else {
        format!("{}d", delta / 86400)
    }
}

/// Render the ANSI graph into HTML and enrich each commit line with node
/// coloring, a relative timestamp, tag labels, and a leading indicator
/// column (`↑` local-only, `↓` remote-only, space for synced commits).
pub fn render_graph_html(
    graph: &str,
    ages: &HashMap<String, i64>,
    primary_set: &HashSet<String>,
    ahead_set: &HashSet<String>,
    behind_set: &HashSet<String>,
    now: i64,
) -> String {
    let mut html = String::from("<pre class=\"git-graph\">");
    for line in graph.lines() {
        let plain = strip_ansi(line);
        let hash = find_hash(&plain, ages);
        let indicator = match &hash {
            Some(h) if ahead_set.contains(h) => '↑',
            Some(h) if behind_set.contains(h) => '↓',
            _ => ' ',
        };
        html.push_str(&format!("<span class=\"indicator\">{indicator}</span>"));

        let mut rendered = ansi_to_html(line);
        if let Some(h) = &hash {
            let class = if primary_set.contains(h) { "node node-primary" } else { "node node-branch" };
            let age = ages.get(h).map(|ts| relative_age(now, *ts)).unwrap_or_default();
            let replacement = if age.is_empty() {
                format!("<span class=\"{class}\">{h}</span>")
            } else {
                format!("<span class=\"{class}\">{h}</span> <span class=\"age\">{age}</span>")
            };
            rendered = rendered.replacen(h.as_str(), &replacement, 1);
        }
        rendered = label_tags(&rendered);
        html.push_str(&rendered);
        html.push('\n');
    }
    html.push_str("</pre>");
    html
}

/// The first token in a line that is a known commit hash.
fn find_hash(plain: &str, ages: &HashMap<String, i64>) -> Option<String> {
    plain
        .split(|c: char| !c.is_ascii_hexdigit())
        .find(|tok| tok.len() >= 7 && ages.contains_key(*tok))
        .map(str::to_owned)
}

/// Wrap `tag: name` decorations in a label span.
pub fn label_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(idx) = rest.find("tag: ") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 5..];
        let end = after.find([',', ')']).unwrap_or(after.len());
        let name = &after[..end];
        out.push_str(&format!("<span class=\"tag\">{name}</span>"));
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}

/// Remove SGR escape sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Translate SGR color escapes into `<span class="ansi-N">` runs, escaping
/// HTML along the way. Unknown escapes are dropped.
pub fn ansi_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            let mut params = String::new();
            let mut terminator = ' ';
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    terminator = c;
                    break;
                }
                params.push(c);
            }
            if terminator != 'm' {
                continue;
            }
            if open {
                out.push_str("</span>");
                open = false;
            }
            let code = params.split(';').next().unwrap_or("");
            if let Ok(n) = code.parse::<u8>() {
                if (30..=37).contains(&n) || (90..=97).contains(&n) || n == 1 {
                    out.push_str(&format!("<span class=\"ansi-{n}\">"));
                    open = true;
                }
            }
            continue;
        }
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    if open {
        out.push_str("</span>");
    }
    out
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
