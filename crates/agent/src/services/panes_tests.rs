// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::TempDir;

use super::{PaneStore, PaneStores};
use crate::state_dir::StateDir;

fn state(tmp: &TempDir) -> StateDir {
    StateDir::new(tmp.path().to_path_buf())
}

#[tokio::test]
async fn create_assigns_id_and_created_at() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let store = PaneStore::open(state(&tmp), "notes.json")?;

    let record = store.create(serde_json::json!({ "content": "hello" })).await?;
    assert!(record.get("id").and_then(|v| v.as_str()).is_some());
    assert!(record.get("createdAt").and_then(|v| v.as_u64()).is_some());
    assert_eq!(record["content"], "hello");
    Ok(())
}

#[tokio::test]
async fn records_survive_a_reload() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let created = {
        let store = PaneStore::open(state(&tmp), "notes.json")?;
        store.create(serde_json::json!({ "content": "persisted" })).await?
    };
    let id = created["id"].as_str().unwrap_or_default().to_owned();

    let reopened = PaneStore::open(state(&tmp), "notes.json")?;
    let loaded = reopened.get(&id).await;
    assert_eq!(loaded, Some(created));
    Ok(())
}

#[tokio::test]
async fn update_merges_but_protects_identity() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let store = PaneStore::open(state(&tmp), "iframes.json")?;
    let record = store.create(serde_json::json!({ "url": "https://a" })).await?;
    let id = record["id"].as_str().unwrap_or_default().to_owned();

    let updated = store
        .update(&id, &serde_json::json!({ "url": "https://b", "id": "forged" }))
        .await?
        .ok_or_else(|| anyhow::anyhow!("pane vanished"))?;
    assert_eq!(updated["url"], "https://b");
    assert_eq!(updated["id"], id.as_str());
    Ok(())
}

#[tokio::test]
async fn update_of_unknown_pane_is_none() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let store = PaneStore::open(state(&tmp), "notes.json")?;
    assert!(store.update("ghost", &serde_json::json!({})).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn remove_is_idempotent() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let store = PaneStore::open(state(&tmp), "folder-panes.json")?;
    let record = store.create(serde_json::json!({ "path": "/tmp" })).await?;
    let id = record["id"].as_str().unwrap_or_default().to_owned();

    assert!(store.remove(&id).await?);
    assert!(!store.remove(&id).await?);
    assert!(store.list().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn stores_map_route_segments() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let stores = PaneStores::open(&state(&tmp))?;
    for kind in ["file-panes", "notes", "git-graphs", "iframes", "folder-panes", "beads-panes"] {
        assert!(stores.by_kind(kind).is_some(), "missing store for {kind}");
    }
    assert!(stores.by_kind("terminals").is_none());
    Ok(())
}
