// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository discovery: bounded-depth walk from fixed roots, streaming
//! each hit as it is found.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Directory names never descended into.
pub const SCAN_DENYLIST: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    ".worktrees",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".cache",
    ".npm",
    ".yarn",
    ".claude",
];

/// Maximum depth below a scan root.
pub const SCAN_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    pub path: String,
    pub name: String,
    pub branch: String,
}

/// Walk `roots` up to [`SCAN_DEPTH`], emitting every repository found.
/// Symlinks are resolved and revisits skipped; a `.git` *file* marks a
/// worktree and is not reported.
pub async fn scan<F>(roots: &[PathBuf], mut emit: F) -> Vec<RepoRecord>
where
    F: FnMut(&RepoRecord),
{
    let mut found = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack: Vec<(PathBuf, usize)> = roots.iter().map(|r| (r.clone(), 0)).collect();

    while let Some((dir, depth)) = stack.pop() {
        let Ok(resolved) = tokio::fs::canonicalize(&dir).await else { continue };
        if !visited.insert(resolved.clone()) {
            continue;
        }

        match repo_kind(&resolved).await {
            RepoKind::Repository => {
                let record = RepoRecord {
                    path: resolved.to_string_lossy().into_owned(),
                    name: dir_name(&resolved),
                    branch: read_branch(&resolved).await,
                };
                emit(&record);
                found.push(record);
                continue;
            }
            // Worktrees are neither reported nor descended into.
            RepoKind::Worktree => continue,
            RepoKind::Plain => {}
        }

        if depth >= SCAN_DEPTH {
            continue;
        }
        let Ok(mut read_dir) = tokio::fs::read_dir(&resolved).await else { continue };
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if SCAN_DENYLIST.contains(&name.as_str()) {
                continue;
            }
            let Ok(file_type) = entry.file_type().await else { continue };
            if file_type.is_dir() || file_type.is_symlink() {
                stack.push((entry.path(), depth + 1));
            }
        }
    }
    found
}

enum RepoKind {
    Repository,
    Worktree,
    Plain,
}

async fn repo_kind(dir: &Path) -> RepoKind {
    let git = dir.join(".git");
    match tokio::fs::metadata(&git).await {
        Ok(meta) if meta.is_dir() => RepoKind::Repository,
        Ok(_) => RepoKind::Worktree,
        Err(_) => RepoKind::Plain,
    }
}

/// Current branch from `.git/HEAD` without spawning a process: a symbolic
/// ref yields the branch name, a detached head the short hash.
pub async fn read_branch(repo: &Path) -> String {
    let head = repo.join(".git").join("HEAD");
    let Ok(text) = tokio::fs::read_to_string(&head).await else {
        return String::new();
    };
    parse_head(&text)
}

pub fn parse_head(text: &str) -> String {
    let text = text.trim();
    if let Some(reference) = text.strip_prefix("ref: ") {
        return reference.strip_prefix("refs/heads/").unwrap_or(reference).to_owned();
    }
    text.chars().take(7).collect()
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Default scan roots: the user's home plus conventional project parents.
pub fn default_roots(home: &Path) -> Vec<PathBuf> {
    let mut roots = vec![home.to_path_buf()];
    for sub in ["projects", "src", "code", "work"] {
        roots.push(home.join(sub));
    }
    roots
}

#[cfg(test)]
#[path = "repos_tests.rs"]
mod tests;
