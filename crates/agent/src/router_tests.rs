// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use fortynine_proto::messages::Message;
use fortynine_proto::rest::RestRequest;
use fortynine_proto::Envelope;

use super::{dispatch, RequestContext};
use crate::config::AgentConfig;
use crate::metrics::MetricsCollector;
use crate::services::panes::PaneStores;
use crate::services::Services;
use crate::state_dir::StateDir;
use crate::terminal::bridge::BridgeSpawner;
use crate::terminal::tmux::Tmux;
use crate::terminal::TerminalManager;
use crate::transport::{outbound_channel, Outbound};

fn test_services(
    tmp: &TempDir,
) -> anyhow::Result<(Arc<Services>, Outbound, mpsc::UnboundedReceiver<Envelope>)> {
    let state = StateDir::new(tmp.path().to_path_buf());
    let (outbound, rx) = outbound_channel();
    outbound.test_connect();

    let tmux = Tmux::new();
    let terminals = Arc::new(TerminalManager::new(
        tmux.clone(),
        state.clone(),
        BridgeSpawner::new("ttyd"),
        outbound.clone(),
        "test-host".to_owned(),
    ));

    let config = AgentConfig {
        cloud_url: "http://localhost:4490".to_owned(),
        token: "tok".to_owned(),
        hostname: "test-host".to_owned(),
        os: "linux".to_owned(),
        version: "0.0.0".to_owned(),
        bridge_cmd: "ttyd".to_owned(),
    };

    let services = Arc::new(Services {
        config,
        state: state.clone(),
        tmux,
        terminals,
        panes: PaneStores::open(&state)?,
        claude_states: Arc::new(tokio::sync::RwLock::new(Default::default())),
        metrics: Arc::new(tokio::sync::Mutex::new(MetricsCollector::new())),
    });
    Ok((services, outbound, rx))
}

fn request(method: &str, path: &str, body: Option<serde_json::Value>) -> RestRequest {
    RestRequest {
        method: method.to_owned(),
        path: path.to_owned(),
        body,
        agent_id: None,
    }
}

fn ctx(outbound: &Outbound, id: &str) -> RequestContext {
    RequestContext { outbound: outbound.clone(), id: Some(id.to_owned()) }
}

#[tokio::test]
async fn unknown_routes_return_404() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let resp =
        dispatch(&services, &request("GET", "/api/unknown", None), &ctx(&outbound, "r1")).await;
    assert_eq!(resp.status, 404);
    Ok(())
}

#[tokio::test]
async fn pane_crud_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let ctx = ctx(&outbound, "r1");

    let created = dispatch(
        &services,
        &request("POST", "/api/notes", Some(serde_json::json!({ "content": "n1" }))),
        &ctx,
    )
    .await;
    assert_eq!(created.status, 200);
    let id = created.body["id"].as_str().unwrap_or_default().to_owned();

    let listed = dispatch(&services, &request("GET", "/api/notes", None), &ctx).await;
    assert_eq!(listed.body["panes"].as_array().map(Vec::len), Some(1));

    let updated = dispatch(
        &services,
        &request(
            "PUT",
            &format!("/api/notes/{id}"),
            Some(serde_json::json!({ "content": "n2" })),
        ),
        &ctx,
    )
    .await;
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["content"], "n2");

    let deleted =
        dispatch(&services, &request("DELETE", &format!("/api/notes/{id}"), None), &ctx).await;
    assert_eq!(deleted.status, 200);

    let missing =
        dispatch(&services, &request("GET", &format!("/api/notes/{id}"), None), &ctx).await;
    assert_eq!(missing.status, 404);
    Ok(())
}

#[tokio::test]
async fn virtual_file_pane_stores_content_in_the_record() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let ctx = ctx(&outbound, "r1");

    let created = dispatch(
        &services,
        &request("POST", "/api/file-panes", Some(serde_json::json!({ "path": "" }))),
        &ctx,
    )
    .await;
    let id = created.body["id"].as_str().unwrap_or_default().to_owned();

    let updated = dispatch(
        &services,
        &request(
            "PUT",
            &format!("/api/file-panes/{id}"),
            Some(serde_json::json!({ "content": "draft" })),
        ),
        &ctx,
    )
    .await;
    assert_eq!(updated.body["content"], "draft");
    Ok(())
}

#[tokio::test]
async fn path_backed_file_pane_writes_to_disk() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let ctx = ctx(&outbound, "r1");

    let file = tmp.path().join("doc.md");
    std::fs::write(&file, "old")?;

    let created = dispatch(
        &services,
        &request(
            "POST",
            "/api/file-panes",
            Some(serde_json::json!({ "path": file.to_string_lossy() })),
        ),
        &ctx,
    )
    .await;
    let id = created.body["id"].as_str().unwrap_or_default().to_owned();

    let updated = dispatch(
        &services,
        &request(
            "PUT",
            &format!("/api/file-panes/{id}"),
            Some(serde_json::json!({ "content": "new body" })),
        ),
        &ctx,
    )
    .await;
    assert_eq!(updated.status, 200);
    assert_eq!(std::fs::read_to_string(&file)?, "new body");
    // Content is not duplicated into the stored record.
    assert!(updated.body.get("content").is_none());
    Ok(())
}

#[tokio::test]
async fn issue_close_with_bad_id_is_400_and_no_subprocess() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let ctx = ctx(&outbound, "r1");

    let created = dispatch(
        &services,
        &request(
            "POST",
            "/api/beads-panes",
            Some(serde_json::json!({ "path": tmp.path().to_string_lossy() })),
        ),
        &ctx,
    )
    .await;
    let pane_id = created.body["id"].as_str().unwrap_or_default().to_owned();

    let resp = dispatch(
        &services,
        &request(
            "POST",
            &format!("/api/beads-panes/{pane_id}/issues/close"),
            Some(serde_json::json!({ "id": "bad id; rm -rf" })),
        ),
        &ctx,
    )
    .await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body["error"], "invalid issue id");
    Ok(())
}

#[tokio::test]
async fn browse_requires_a_path() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let resp = dispatch(
        &services,
        &request("GET", "/api/files/browse", None),
        &ctx(&outbound, "r1"),
    )
    .await;
    assert_eq!(resp.status, 400);
    Ok(())
}

#[tokio::test]
async fn devices_reports_host_identity() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let resp =
        dispatch(&services, &request("GET", "/api/devices", None), &ctx(&outbound, "r1")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["devices"][0]["hostname"], "test-host");
    Ok(())
}

#[tokio::test]
async fn repo_scan_streams_partials_with_the_request_id() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, mut rx) = test_services(&tmp)?;

    let repo = tmp.path().join("myrepo");
    std::fs::create_dir_all(repo.join(".git"))?;
    std::fs::write(repo.join(".git/HEAD"), "ref: refs/heads/main\n")?;

    let path = format!(
        "/api/git-repos/in-folder?path={}",
        tmp.path().to_string_lossy()
    );
    let resp =
        dispatch(&services, &request("GET", &path, None), &ctx(&outbound, "scan-1")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["repos"].as_array().map(Vec::len), Some(1));

    let partial = rx.try_recv()?;
    assert_eq!(partial.id.as_deref(), Some("scan-1"));
    match partial.message {
        Message::ScanPartial(value) => assert_eq!(value["name"], "myrepo"),
        other => anyhow::bail!("expected scan:partial, got {}", other.kind()),
    }
    Ok(())
}

#[tokio::test]
async fn terminal_listing_is_empty_without_records() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (services, outbound, _rx) = test_services(&tmp)?;
    let resp =
        dispatch(&services, &request("GET", "/api/terminals", None), &ctx(&outbound, "r1")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["terminals"].as_array().map(Vec::len), Some(0));
    Ok(())
}
