// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type pane stores: thin CRUD over the state directory's JSON
//! documents. Position and size are not stored here — the cloud owns
//! layout; these records carry only identity and type-specific fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::state_dir::StateDir;
use crate::transport::epoch_ms;

/// On-disk shape of every pane document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanesDoc {
    pub version: u32,
    pub panes: BTreeMap<String, serde_json::Value>,
}

impl Default for PanesDoc {
    fn default() -> Self {
        Self { version: 1, panes: BTreeMap::new() }
    }
}

/// CRUD over one pane type's document.
pub struct PaneStore {
    state: StateDir,
    file: &'static str,
    panes: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl PaneStore {
    pub fn open(state: StateDir, file: &'static str) -> anyhow::Result<Self> {
        let doc: PanesDoc = state.load_doc(file)?;
        Ok(Self { state, file, panes: RwLock::new(doc.panes) })
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let panes = self.panes.read().await.clone();
        self.state.save_doc(self.file, &PanesDoc { version: 1, panes })
    }

    pub async fn list(&self) -> Vec<serde_json::Value> {
        self.panes.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<serde_json::Value> {
        self.panes.read().await.get(id).cloned()
    }

    /// Create a pane from the request body; `id` and `createdAt` are
    /// assigned here.
    pub async fn create(&self, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut record = match body {
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            serde_json::Value::Null => serde_json::json!({}),
            _ => anyhow::bail!("pane body must be an object"),
        };
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".to_owned(), serde_json::Value::String(id.clone()));
            obj.insert("createdAt".to_owned(), serde_json::json!(epoch_ms()));
        }
        self.panes.write().await.insert(id, record.clone());
        self.persist().await?;
        Ok(record)
    }

    /// Merge body fields into an existing pane. `id`/`createdAt` cannot be
    /// overwritten.
    pub async fn update(
        &self,
        id: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let updated = {
            let mut panes = self.panes.write().await;
            let Some(record) = panes.get_mut(id) else { return Ok(None) };
            if let (Some(target), Some(fields)) = (record.as_object_mut(), body.as_object()) {
                for (key, value) in fields {
                    if key == "id" || key == "createdAt" {
                        continue;
                    }
                    target.insert(key.clone(), value.clone());
                }
            }
            record.clone()
        };
        self.persist().await?;
        Ok(Some(updated))
    }

    pub async fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let removed = self.panes.write().await.remove(id).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}

/// All six pane stores, one JSON document each.
pub struct PaneStores {
    pub file_panes: PaneStore,
    pub notes: PaneStore,
    pub git_graphs: PaneStore,
    pub iframes: PaneStore,
    pub folder_panes: PaneStore,
    pub beads_panes: PaneStore,
}

impl PaneStores {
    pub fn open(state: &StateDir) -> anyhow::Result<Self> {
        Ok(Self {
            file_panes: PaneStore::open(state.clone(), "file-panes.json")?,
            notes: PaneStore::open(state.clone(), "notes.json")?,
            git_graphs: PaneStore::open(state.clone(), "git-graphs.json")?,
            iframes: PaneStore::open(state.clone(), "iframes.json")?,
            folder_panes: PaneStore::open(state.clone(), "folder-panes.json")?,
            beads_panes: PaneStore::open(state.clone(), "beads-panes.json")?,
        })
    }

    /// Store for a route segment like `file-panes` or `notes`.
    pub fn by_kind(&self, kind: &str) -> Option<&PaneStore> {
        match kind {
            "file-panes" => Some(&self.file_panes),
            "notes" => Some(&self.notes),
            "git-graphs" => Some(&self.git_graphs),
            "iframes" => Some(&self.iframes),
            "folder-panes" => Some(&self.folder_panes),
            "beads-panes" => Some(&self.beads_panes),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "panes_tests.rs"]
mod tests;
