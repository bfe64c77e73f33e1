// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use super::StateDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Doc {
    version: u32,
    entries: BTreeMap<String, String>,
}

#[test]
fn missing_doc_loads_default() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    let doc: Doc = state.load_doc("nothing.json")?;
    assert_eq!(doc, Doc::default());
    Ok(())
}

#[test]
fn save_then_load_round_trips() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    let mut doc = Doc { version: 1, entries: BTreeMap::new() };
    doc.entries.insert("a".to_owned(), "b".to_owned());
    state.save_doc("doc.json", &doc)?;
    let loaded: Doc = state.load_doc("doc.json")?;
    assert_eq!(loaded, doc);
    Ok(())
}

#[test]
fn save_leaves_no_temp_file_behind() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    state.save_doc("doc.json", &Doc::default())?;
    let names: Vec<String> = std::fs::read_dir(tmp.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["doc.json"]);
    Ok(())
}

#[test]
fn credentials_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    assert_eq!(state.read_token()?, None);
    state.write_credentials("secret", Some("agent-1"))?;
    assert_eq!(state.read_token()?.as_deref(), Some("secret"));
    Ok(())
}

#[test]
fn cloud_url_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    assert_eq!(state.read_cloud_url()?, None);
    state.write_cloud_url("https://cloud.example\n")?;
    assert_eq!(state.read_cloud_url()?.as_deref(), Some("https://cloud.example"));
    Ok(())
}

#[test]
fn pid_file_lifecycle() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = StateDir::new(tmp.path().to_path_buf());
    assert_eq!(state.read_pid()?, None);
    state.write_pid(4242)?;
    assert_eq!(state.read_pid()?, Some(4242));
    state.remove_pid();
    assert_eq!(state.read_pid()?, None);
    Ok(())
}
