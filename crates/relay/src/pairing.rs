// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory pairing pool. Codes are short-lived, unambiguous, and
//! consumable exactly once: the successful poll after approval returns the
//! token and deletes the code.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// 32-character alphabet excluding the ambiguous `0OI1`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Pairing code length.
pub const CODE_LEN: usize = 6;
/// Code lifetime.
pub const CODE_TTL: Duration = Duration::from_secs(600);
/// Uniqueness retries against the pending pool.
const CODE_RETRIES: usize = 10;
/// Periodic sweep cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    Pending,
    Approved,
}

#[derive(Debug, Clone)]
pub struct PairingEntry {
    pub user_id: Option<String>,
    pub hostname: String,
    pub os: String,
    pub version: String,
    pub status: PairingStatus,
    pub token: Option<String>,
    pub agent_id: Option<String>,
    pub expires_at: Instant,
}

/// Outcome of an agent poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    /// Consumes the code.
    Approved { token: String, agent_id: String },
    Expired,
    NotFound,
}

pub struct PairingPool {
    ttl: Duration,
    entries: Mutex<HashMap<String, PairingEntry>>,
}

impl PairingPool {
    pub fn new() -> Self {
        Self::with_ttl(CODE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Register a pairing attempt and hand back its code.
    pub async fn start(
        &self,
        hostname: &str,
        os: &str,
        version: &str,
    ) -> anyhow::Result<String> {
        let mut entries = self.entries.lock().await;
        let mut code = generate_code();
        let mut retries = 0;
        while entries.contains_key(&code) {
            retries += 1;
            if retries > CODE_RETRIES {
                anyhow::bail!("could not allocate a unique pairing code");
            }
            code = generate_code();
        }
        entries.insert(
            code.clone(),
            PairingEntry {
                user_id: None,
                hostname: hostname.to_owned(),
                os: os.to_owned(),
                version: version.to_owned(),
                status: PairingStatus::Pending,
                token: None,
                agent_id: None,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(code)
    }

    /// Pending entry for an approval attempt, if the code is live.
    pub async fn pending(&self, code: &str) -> Option<PairingEntry> {
        let entries = self.entries.lock().await;
        entries
            .get(code)
            .filter(|e| e.status == PairingStatus::Pending && e.expires_at > Instant::now())
            .cloned()
    }

    /// Mark a code approved, attaching the owning user, the minted token,
    /// and the persistent agent id.
    pub async fn approve(
        &self,
        code: &str,
        user_id: &str,
        token: &str,
        agent_id: &str,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(code) {
            Some(entry)
                if entry.status == PairingStatus::Pending
                    && entry.expires_at > Instant::now() =>
            {
                entry.status = PairingStatus::Approved;
                entry.user_id = Some(user_id.to_owned());
                entry.token = Some(token.to_owned());
                entry.agent_id = Some(agent_id.to_owned());
                true
            }
            _ => false,
        }
    }

    /// Agent-side poll. An approved code is consumed by the poll that
    /// observes it; an expired code is evicted and reported gone.
    pub async fn poll(&self, code: &str) -> PollOutcome {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(code) else {
            return PollOutcome::NotFound;
        };
        if entry.expires_at <= Instant::now() {
            entries.remove(code);
            return PollOutcome::Expired;
        }
        match entry.status {
            PairingStatus::Pending => PollOutcome::Pending,
            PairingStatus::Approved => {
                let entry = match entries.remove(code) {
                    Some(e) => e,
                    None => return PollOutcome::NotFound,
                };
                match (entry.token, entry.agent_id) {
                    (Some(token), Some(agent_id)) => PollOutcome::Approved { token, agent_id },
                    _ => PollOutcome::NotFound,
                }
            }
        }
    }

    /// Drop expired entries.
    pub async fn sweep(&self) {
        let now = Instant::now();
        self.entries.lock().await.retain(|_, e| e.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Periodic sweeper task.
    pub fn spawn_sweeper(self: &std::sync::Arc<Self>, shutdown: CancellationToken) {
        let pool = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => pool.sweep().await,
                }
            }
        });
    }
}

impl Default for PairingPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A 6-character code from the unambiguous alphabet.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
