// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted relay state: users, agents, pane layouts, notes, preferences,
//! view state, and messages. One JSON document per record type under the
//! data directory, written full-replace via temp file + rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use fortynine_proto::Tier;

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A browser user. Identity-provider ids and billing refs live with the
/// external providers; the relay holds the tier and the session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub tier: Tier,
    pub session_token: String,
    pub created_at: u64,
}

/// A paired agent. Unique on `(user_id, hostname)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRow {
    pub id: String,
    pub user_id: String,
    pub hostname: String,
    pub os: String,
    pub version: String,
    pub token_hash: String,
    pub last_seen_at: u64,
}

/// One pane rectangle. The cloud owns layout; agents never see x/y/w/h.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneLayout {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub pane_type: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub z_index: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Cloud-authoritative note content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudNote {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub font_size: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A user<->admin message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMessage {
    pub id: String,
    pub user_id: String,
    pub from: String,
    pub text: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Table<T> {
    version: u32,
    rows: BTreeMap<String, T>,
}

pub struct Store {
    dir: PathBuf,
    users: RwLock<BTreeMap<String, User>>,
    agents: RwLock<BTreeMap<String, AgentRow>>,
    layouts: RwLock<BTreeMap<String, PaneLayout>>,
    notes: RwLock<BTreeMap<String, CloudNote>>,
    preferences: RwLock<BTreeMap<String, serde_json::Value>>,
    view_state: RwLock<BTreeMap<String, serde_json::Value>>,
    messages: RwLock<BTreeMap<String, AdminMessage>>,
}

impl Store {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            users: RwLock::new(load_table(dir, "users.json")?),
            agents: RwLock::new(load_table(dir, "agents.json")?),
            layouts: RwLock::new(load_table(dir, "layouts.json")?),
            notes: RwLock::new(load_table(dir, "notes.json")?),
            preferences: RwLock::new(load_table(dir, "preferences.json")?),
            view_state: RwLock::new(load_table(dir, "view-state.json")?),
            messages: RwLock::new(load_table(dir, "messages.json")?),
        })
    }

    // -- Users -------------------------------------------------------------

    pub async fn user_by_session_token(&self, token: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| !u.session_token.is_empty() && u.session_token == token)
            .cloned()
    }

    pub async fn user_by_id(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    /// Insert or replace a user row (identity and billing events own the
    /// fields; the relay just persists them).
    pub async fn put_user(&self, user: User) -> anyhow::Result<()> {
        self.users.write().await.insert(user.id.clone(), user);
        self.save_users().await
    }

    async fn save_users(&self) -> anyhow::Result<()> {
        save_table(&self.dir, "users.json", &*self.users.read().await)
    }

    // -- Agents ------------------------------------------------------------

    /// Create or refresh the agent row for `(user_id, hostname)`. Re-pairing
    /// the same host rotates the token but keeps the agent id.
    pub async fn upsert_agent(
        &self,
        user_id: &str,
        hostname: &str,
        os: &str,
        version: &str,
        token: &str,
    ) -> anyhow::Result<AgentRow> {
        let mut agents = self.agents.write().await;
        let existing_id = agents
            .values()
            .find(|a| a.user_id == user_id && a.hostname == hostname)
            .map(|a| a.id.clone());
        let id = existing_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let row = AgentRow {
            id: id.clone(),
            user_id: user_id.to_owned(),
            hostname: hostname.to_owned(),
            os: os.to_owned(),
            version: version.to_owned(),
            token_hash: hash_token(token),
            last_seen_at: epoch_ms(),
        };
        agents.insert(id, row.clone());
        drop(agents);
        self.save_agents().await?;
        Ok(row)
    }

    /// Look up an agent by its bearer token.
    pub async fn agent_by_token(&self, token: &str) -> Option<AgentRow> {
        let hash = hash_token(token);
        self.agents.read().await.values().find(|a| a.token_hash == hash).cloned()
    }

    pub async fn agent_by_id(&self, id: &str) -> Option<AgentRow> {
        self.agents.read().await.get(id).cloned()
    }

    pub async fn touch_agent(&self, id: &str) -> anyhow::Result<()> {
        if let Some(agent) = self.agents.write().await.get_mut(id) {
            agent.last_seen_at = epoch_ms();
        }
        self.save_agents().await
    }

    async fn save_agents(&self) -> anyhow::Result<()> {
        save_table(&self.dir, "agents.json", &*self.agents.read().await)
    }

    // -- Layouts -----------------------------------------------------------

    pub async fn layouts_for_user(&self, user_id: &str) -> Vec<PaneLayout> {
        let mut rows: Vec<PaneLayout> = self
            .layouts
            .read()
            .await
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    /// Atomically replace a user's full layout.
    pub async fn put_layout(&self, user_id: &str, mut rows: Vec<PaneLayout>) -> anyhow::Result<()> {
        let mut layouts = self.layouts.write().await;
        layouts.retain(|_, l| l.user_id != user_id);
        for row in rows.drain(..) {
            let mut row = row;
            row.user_id = user_id.to_owned();
            if row.id.is_empty() {
                row.id = uuid::Uuid::new_v4().simple().to_string();
            }
            layouts.insert(row.id.clone(), row);
        }
        drop(layouts);
        self.save_layouts().await
    }

    /// Patch one pane's geometry (drag/resize).
    pub async fn patch_layout(
        &self,
        user_id: &str,
        id: &str,
        patch: &serde_json::Value,
    ) -> anyhow::Result<Option<PaneLayout>> {
        let patched = {
            let mut layouts = self.layouts.write().await;
            let Some(row) = layouts.get_mut(id).filter(|l| l.user_id == user_id) else {
                return Ok(None);
            };
            if let Some(x) = patch.get("x").and_then(|v| v.as_f64()) {
                row.x = x;
            }
            if let Some(y) = patch.get("y").and_then(|v| v.as_f64()) {
                row.y = y;
            }
            if let Some(w) = patch.get("w").and_then(|v| v.as_f64()) {
                row.w = w;
            }
            if let Some(h) = patch.get("h").and_then(|v| v.as_f64()) {
                row.h = h;
            }
            if let Some(z) = patch.get("zIndex").and_then(|v| v.as_i64()) {
                row.z_index = z;
            }
            row.clone()
        };
        self.save_layouts().await?;
        Ok(Some(patched))
    }

    /// How many panes of a type a user has (tier gating input).
    pub async fn count_panes(&self, user_id: &str, pane_type: &str) -> u32 {
        self.layouts
            .read()
            .await
            .values()
            .filter(|l| l.user_id == user_id && l.pane_type == pane_type)
            .count() as u32
    }

    async fn save_layouts(&self) -> anyhow::Result<()> {
        save_table(&self.dir, "layouts.json", &*self.layouts.read().await)
    }

    // -- Notes -------------------------------------------------------------

    pub async fn notes_for_user(&self, user_id: &str) -> Vec<CloudNote> {
        self.notes.read().await.values().filter(|n| n.user_id == user_id).cloned().collect()
    }

    pub async fn put_note(&self, note: CloudNote) -> anyhow::Result<CloudNote> {
        let mut note = note;
        if note.id.is_empty() {
            note.id = uuid::Uuid::new_v4().simple().to_string();
        }
        self.notes.write().await.insert(note.id.clone(), note.clone());
        save_table(&self.dir, "notes.json", &*self.notes.read().await)?;
        Ok(note)
    }

    pub async fn delete_note(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let removed = {
            let mut notes = self.notes.write().await;
            match notes.get(id) {
                Some(note) if note.user_id == user_id => notes.remove(id).is_some(),
                _ => false,
            }
        };
        if removed {
            save_table(&self.dir, "notes.json", &*self.notes.read().await)?;
        }
        Ok(removed)
    }

    // -- Preferences / view state -------------------------------------------

    pub async fn preferences(&self, user_id: &str) -> serde_json::Value {
        self.preferences.read().await.get(user_id).cloned().unwrap_or(serde_json::json!({}))
    }

    pub async fn put_preferences(
        &self,
        user_id: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.preferences.write().await.insert(user_id.to_owned(), value);
        save_table(&self.dir, "preferences.json", &*self.preferences.read().await)
    }

    pub async fn view_state(&self, user_id: &str) -> serde_json::Value {
        self.view_state.read().await.get(user_id).cloned().unwrap_or(serde_json::json!({}))
    }

    pub async fn put_view_state(
        &self,
        user_id: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.view_state.write().await.insert(user_id.to_owned(), value);
        save_table(&self.dir, "view-state.json", &*self.view_state.read().await)
    }

    // -- Messages ----------------------------------------------------------

    pub async fn messages_for_user(&self, user_id: &str) -> Vec<AdminMessage> {
        let mut rows: Vec<AdminMessage> = self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    pub async fn append_message(
        &self,
        user_id: &str,
        from: &str,
        text: &str,
    ) -> anyhow::Result<AdminMessage> {
        let message = AdminMessage {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_owned(),
            from: from.to_owned(),
            text: text.to_owned(),
            created_at: epoch_ms(),
        };
        self.messages.write().await.insert(message.id.clone(), message.clone());
        save_table(&self.dir, "messages.json", &*self.messages.read().await)?;
        Ok(message)
    }
}

/// SHA-256 hex of an agent token; only hashes are persisted.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn load_table<T: DeserializeOwned + Clone>(
    dir: &Path,
    name: &str,
) -> anyhow::Result<BTreeMap<String, T>> {
    let path = dir.join(name);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    let table: Table<T> = serde_json::from_str(&text)?;
    Ok(table.rows)
}

fn save_table<T: Serialize + Clone>(
    dir: &Path,
    name: &str,
    rows: &BTreeMap<String, T>,
) -> anyhow::Result<()> {
    let table = Table { version: 1, rows: rows.clone() };
    let tmp = dir.join(format!(".{name}.tmp"));
    std::fs::write(&tmp, serde_json::to_string_pretty(&table)?)?;
    std::fs::rename(&tmp, dir.join(name))?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
