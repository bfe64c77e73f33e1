// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only analytics log: one JSON object per line.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

pub struct EventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn open(dir: &Path) -> Self {
        Self { path: dir.join("events.jsonl"), write_lock: Mutex::new(()) }
    }

    /// Append one event. Analytics failures never propagate.
    pub async fn record(&self, user_id: &str, event_type: &str, data: serde_json::Value) {
        let line = serde_json::json!({
            "ts": std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            "userId": user_id,
            "type": event_type,
            "data": data,
        });
        let _guard = self.write_lock.lock().await;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = result {
            warn!(err = %e, event_type, "failed to append event");
        }
    }

    /// All recorded events (test/debug helper).
    pub fn read_all(&self) -> Vec<serde_json::Value> {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return vec![];
        };
        text.lines().filter_map(|l| serde_json::from_str(l).ok()).collect()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
