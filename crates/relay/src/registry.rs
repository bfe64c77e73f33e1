// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live connection registry: per user, the set of browser connections and
//! the set of agent connections. This module is the single owner of both
//! maps; routing goes through its API only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

/// Identifies one browser WebSocket connection.
pub type BrowserId = u64;

type FrameTx = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct UserConns {
    browsers: HashMap<BrowserId, FrameTx>,
    agents: HashMap<String, AgentConn>,
}

struct AgentConn {
    conn_id: u64,
    tx: FrameTx,
}

#[derive(Default)]
pub struct Registry {
    users: RwLock<HashMap<String, UserConns>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // -- Browsers ----------------------------------------------------------

    pub async fn add_browser(&self, user_id: &str, tx: FrameTx) -> BrowserId {
        let id = self.next();
        self.users
            .write()
            .await
            .entry(user_id.to_owned())
            .or_default()
            .browsers
            .insert(id, tx);
        id
    }

    pub async fn remove_browser(&self, user_id: &str, id: BrowserId) {
        let mut users = self.users.write().await;
        if let Some(conns) = users.get_mut(user_id) {
            conns.browsers.remove(&id);
            if conns.browsers.is_empty() && conns.agents.is_empty() {
                users.remove(user_id);
            }
        }
    }

    /// Send to one browser. `false` when the connection is gone.
    pub async fn send_to_browser(&self, user_id: &str, id: BrowserId, text: String) -> bool {
        let users = self.users.read().await;
        users
            .get(user_id)
            .and_then(|c| c.browsers.get(&id))
            .map(|tx| tx.send(text).is_ok())
            .unwrap_or(false)
    }

    /// Fan a frame out to all of a user's browsers.
    pub async fn broadcast_browsers(&self, user_id: &str, text: &str) {
        let users = self.users.read().await;
        if let Some(conns) = users.get(user_id) {
            for tx in conns.browsers.values() {
                let _ = tx.send(text.to_owned());
            }
        }
    }

    // -- Agents ------------------------------------------------------------

    /// Bind an authenticated agent connection. A reconnect for the same
    /// agent id supersedes the previous connection.
    pub async fn add_agent(&self, user_id: &str, agent_id: &str, tx: FrameTx) -> u64 {
        let conn_id = self.next();
        self.users
            .write()
            .await
            .entry(user_id.to_owned())
            .or_default()
            .agents
            .insert(agent_id.to_owned(), AgentConn { conn_id, tx });
        conn_id
    }

    /// Remove an agent connection, but only if `conn_id` still owns the
    /// slot (a reconnect may have superseded it). Returns `true` when the
    /// user has no agents left afterwards.
    pub async fn remove_agent(&self, user_id: &str, agent_id: &str, conn_id: u64) -> bool {
        let mut users = self.users.write().await;
        let Some(conns) = users.get_mut(user_id) else { return false };
        if conns.agents.get(agent_id).map(|a| a.conn_id) == Some(conn_id) {
            conns.agents.remove(agent_id);
        }
        let none_left = conns.agents.is_empty();
        if none_left && conns.browsers.is_empty() {
            users.remove(user_id);
        }
        none_left
    }

    pub async fn has_agent(&self, user_id: &str, agent_id: &str) -> bool {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|c| c.agents.contains_key(agent_id))
            .unwrap_or(false)
    }

    pub async fn agent_count(&self, user_id: &str) -> usize {
        self.users.read().await.get(user_id).map(|c| c.agents.len()).unwrap_or(0)
    }

    /// Send to a specific agent. `false` when it is not connected.
    pub async fn send_to_agent(&self, user_id: &str, agent_id: &str, text: String) -> bool {
        let users = self.users.read().await;
        users
            .get(user_id)
            .and_then(|c| c.agents.get(agent_id))
            .map(|a| a.tx.send(text).is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
