// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation between a Claude process and its session, and between a
//! session and a human-readable name.
//!
//! Both lookups touch files that can be large (debug logs, transcripts), so
//! reads are bounded: 16 KiB tails for debug logs, 64 KiB head + tail for
//! transcripts. Results are cached — including misses — so a pass never
//! rescans within the TTL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Tail window searched for the pid marker in debug logs.
const DEBUG_TAIL: u64 = 16 * 1024;
/// Head/tail window read from transcripts.
const TRANSCRIPT_WINDOW: u64 = 64 * 1024;
/// TTL for pid -> session-id results (hits and misses alike).
const SESSION_ID_TTL: Duration = Duration::from_secs(15);
/// Minimum interval between transcript re-reads, even on mtime change.
const NAME_REREAD_MIN: Duration = Duration::from_secs(15);
/// Maximum length of a derived session name.
const NAME_MAX: usize = 100;

/// pid -> session-id cache.
#[derive(Debug, Default)]
pub struct SessionIdCache {
    entries: HashMap<u32, IdEntry>,
}

#[derive(Debug)]
struct IdEntry {
    session_id: Option<String>,
    resolved_at: Instant,
}

impl SessionIdCache {
    /// Resolve the session id for a Claude pid, scanning the debug
    /// directory on a cache miss. A null result is cached too, to suppress
    /// repeated scans.
    pub async fn lookup(&mut self, pid: u32, debug_dir: &Path) -> Option<String> {
        if let Some(entry) = self.entries.get(&pid) {
            if entry.resolved_at.elapsed() < SESSION_ID_TTL {
                return entry.session_id.clone();
            }
        }
        let session_id = scan_debug_dir(debug_dir, pid).await;
        self.entries
            .insert(pid, IdEntry { session_id: session_id.clone(), resolved_at: Instant::now() });
        session_id
    }
}

/// Search most-recently-modified `.txt` debug logs for `tmp.<pid>.`; the
/// matching file's stem is the session id.
async fn scan_debug_dir(debug_dir: &Path, pid: u32) -> Option<String> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(debug_dir).await.ok()?;
    while let Ok(Some(entry)) = dir.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let mtime = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((mtime, path));
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let marker = format!("tmp.{pid}.");
    for (_, path) in entries {
        if let Some(tail) = read_tail(&path, DEBUG_TAIL).await {
            if tail.contains(&marker) {
                return path.file_stem().map(|s| s.to_string_lossy().into_owned());
            }
        }
    }
    None
}

/// session-id -> name cache.
#[derive(Debug, Default)]
pub struct SessionNameCache {
    entries: HashMap<String, NameEntry>,
}

#[derive(Debug)]
struct NameEntry {
    name: Option<String>,
    transcript_mtime: Option<SystemTime>,
    read_at: Instant,
}

impl SessionNameCache {
    /// Resolve the display name for a session. Re-reads the transcript only
    /// when its mtime changed AND the minimum re-read interval has elapsed.
    pub async fn resolve(
        &mut self,
        projects_dir: &Path,
        cwd: &str,
        session_id: &str,
    ) -> Option<String> {
        let transcript = transcript_path(projects_dir, cwd, session_id);
        let mtime = tokio::fs::metadata(&transcript).await.ok().and_then(|m| m.modified().ok());

        if let Some(entry) = self.entries.get(session_id) {
            let fresh = entry.read_at.elapsed() < NAME_REREAD_MIN;
            if fresh || entry.transcript_mtime == mtime {
                return entry.name.clone();
            }
        }

        let name = extract_session_name(&transcript).await;
        self.entries.insert(
            session_id.to_owned(),
            NameEntry { name: name.clone(), transcript_mtime: mtime, read_at: Instant::now() },
        );
        name
    }
}

/// Transcript location: the projects directory contains one subdirectory
/// per hyphen-encoded working directory.
pub fn transcript_path(projects_dir: &Path, cwd: &str, session_id: &str) -> PathBuf {
    projects_dir.join(encode_cwd(cwd)).join(format!("{session_id}.jsonl"))
}

/// Hyphen-encode a working directory for the transcript tree.
pub fn encode_cwd(cwd: &str) -> String {
    cwd.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '-' }).collect()
}

/// Derive a session name from a transcript: the most recent `custom-title`
/// record in the tail wins; otherwise the first plausible user message in
/// the head.
async fn extract_session_name(transcript: &Path) -> Option<String> {
    let (head, tail) = read_head_tail(transcript, TRANSCRIPT_WINDOW).await?;

    if let Some(title) = latest_custom_title(&tail) {
        return Some(title);
    }
    first_user_message(&head)
}

/// Scan JSONL lines (newest last) for the most recent custom-title record.
pub fn latest_custom_title(tail: &str) -> Option<String> {
    let mut latest = None;
    for line in tail.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else { continue };
        if value.get("type").and_then(|t| t.as_str()) == Some("custom-title") {
            if let Some(title) = value.get("title").and_then(|t| t.as_str()) {
                let title = title.trim();
                if !title.is_empty() {
                    latest = Some(truncate_name(title));
                }
            }
        }
    }
    latest
}

/// The first user message that looks like prose: not starting with `<` or
/// `[`, at least 4 characters, trimmed to 100.
pub fn first_user_message(head: &str) -> Option<String> {
    for line in head.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else { continue };
        if value.get("type").and_then(|t| t.as_str()) != Some("user") {
            continue;
        }
        let Some(text) = user_message_text(&value) else { continue };
        let text = text.trim();
        if text.len() < 4 || text.starts_with('<') || text.starts_with('[') {
            continue;
        }
        return Some(truncate_name(text));
    }
    None
}

/// Message text from either a plain string or a content-block array.
fn user_message_text(value: &serde_json::Value) -> Option<String> {
    let content = value.get("message")?.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_owned());
    }
    for block in content.as_array()? {
        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                return Some(text.to_owned());
            }
        }
    }
    None
}

fn truncate_name(text: &str) -> String {
    if text.chars().count() <= NAME_MAX {
        text.to_owned()
    } else {
        text.chars().take(NAME_MAX).collect()
    }
}

/// Read at most `window` bytes from the end of a file.
async fn read_tail(path: &Path, window: u64) -> Option<String> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();
    let start = len.saturating_sub(window);
    file.seek(std::io::SeekFrom::Start(start)).await.ok()?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.take(window).read_to_end(&mut buf).await.ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Read the head and tail windows of a file. Overlapping windows (small
/// files) are fine: head and tail then both contain the whole file.
async fn read_head_tail(path: &Path, window: u64) -> Option<(String, String)> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();

    let mut head_buf = Vec::with_capacity(window.min(len) as usize);
    (&mut file).take(window).read_to_end(&mut head_buf).await.ok()?;
    let head = String::from_utf8_lossy(&head_buf).into_owned();

    let start = len.saturating_sub(window);
    file.seek(std::io::SeekFrom::Start(start)).await.ok()?;
    let mut tail_buf = Vec::with_capacity((len - start) as usize);
    file.take(window).read_to_end(&mut tail_buf).await.ok()?;
    let tail = String::from_utf8_lossy(&tail_buf).into_owned();

    Some((head, tail))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
