// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the relay HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use axum_test::TestServer;
use clap::Parser;
use tempfile::TempDir;

use fortynine_proto::Tier;
use fortynine_relay::config::RelayConfig;
use fortynine_relay::state::RelayState;
use fortynine_relay::store::User;
use fortynine_relay::transport::build_router;

fn test_state(tmp: &TempDir) -> Arc<RelayState> {
    let config = RelayConfig::parse_from([
        "fortynine-relay",
        "--data-dir",
        &tmp.path().to_string_lossy(),
        "--public-url",
        "https://cloud.example",
    ]);
    Arc::new(RelayState::new(config).expect("failed to open relay state"))
}

fn test_server(state: Arc<RelayState>) -> TestServer {
    TestServer::new(build_router(state)).expect("failed to create test server")
}

async fn insert_user(state: &RelayState, id: &str, tier: Tier) {
    let user = User {
        id: id.to_owned(),
        email: format!("{id}@example.com"),
        display_name: id.to_owned(),
        tier,
        session_token: format!("sess-{id}"),
        created_at: 0,
    };
    state.store.put_user(user).await.expect("failed to insert user");
}

#[tokio::test]
async fn health_is_public() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let server = test_server(test_state(&tmp));
    let resp = server.get("/api/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    Ok(())
}

#[tokio::test]
async fn pairing_happy_path_consumes_the_code() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = test_state(&tmp);
    insert_user(&state, "u1", Tier::Free).await;
    let server = test_server(Arc::clone(&state));

    // Agent starts pairing.
    let resp = server
        .post("/api/agents/pair")
        .json(&serde_json::json!({ "hostname": "laptop", "os": "linux", "version": "0.4" }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let code = body["code"].as_str().unwrap_or_default().to_owned();
    assert_eq!(code.len(), 6);
    assert_eq!(body["expiresIn"], 600);
    assert!(body["pairUrl"].as_str().unwrap_or_default().contains(&code));

    // Polling before approval is pending.
    let resp = server.get(&format!("/api/agents/pair-status?code={code}")).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "pending");

    // Browser approves.
    let resp = server
        .post("/api/agents/approve")
        .add_header("authorization", "Bearer sess-u1")
        .json(&serde_json::json!({ "code": code }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["ok"], true);
    let agent_id = body["agentId"].as_str().unwrap_or_default().to_owned();

    // The next poll returns the token and consumes the code.
    let resp = server.get(&format!("/api/agents/pair-status?code={code}")).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "approved");
    assert_eq!(body["agentId"], agent_id.as_str());
    let token = body["token"].as_str().unwrap_or_default().to_owned();
    assert!(!token.is_empty());

    // The minted token authenticates the agent.
    assert!(state.store.agent_by_token(&token).await.is_some());

    // A second poll with the same code is 404.
    let resp = server.get(&format!("/api/agents/pair-status?code={code}")).await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn approve_requires_authentication() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let server = test_server(test_state(&tmp));
    let resp = server
        .post("/api/agents/approve")
        .json(&serde_json::json!({ "code": "ABCDEF" }))
        .await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_pairing_code_is_404() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let server = test_server(test_state(&tmp));
    let resp = server.get("/api/agents/pair-status?code=XXXXXX").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn layout_round_trip_with_session_cookie() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = test_state(&tmp);
    insert_user(&state, "u1", Tier::Pro).await;
    let server = test_server(state);

    let resp = server
        .put("/api/layout")
        .add_header("cookie", "session=sess-u1")
        .json(&serde_json::json!({
            "panes": [{
                "id": "p1",
                "userId": "u1",
                "paneType": "terminal",
                "x": 10.0, "y": 20.0, "w": 640.0, "h": 480.0,
                "zIndex": 1,
                "metadata": { "terminalId": "t1" }
            }]
        }))
        .await;
    resp.assert_status_ok();

    let resp = server.get("/api/layout").add_header("cookie", "session=sess-u1").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["panes"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["panes"][0]["paneType"], "terminal");

    // Drag patch.
    let resp = server
        .patch("/api/layout/p1")
        .add_header("cookie", "session=sess-u1")
        .json(&serde_json::json!({ "x": 99.0 }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["x"], 99.0);
    Ok(())
}

#[tokio::test]
async fn layout_requires_auth() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let server = test_server(test_state(&tmp));
    let resp = server.get("/api/layout").await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn notes_crud() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = test_state(&tmp);
    insert_user(&state, "u1", Tier::Free).await;
    let server = test_server(state);

    let resp = server
        .post("/api/notes")
        .add_header("authorization", "Bearer sess-u1")
        .json(&serde_json::json!({
            "id": "",
            "userId": "",
            "content": "remember",
            "fontSize": 14,
            "images": []
        }))
        .await;
    resp.assert_status_ok();
    let note: serde_json::Value = resp.json();
    let id = note["id"].as_str().unwrap_or_default().to_owned();
    assert!(!id.is_empty());

    let resp = server.get("/api/notes").add_header("authorization", "Bearer sess-u1").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["notes"].as_array().map(Vec::len), Some(1));

    let resp = server
        .delete(&format!("/api/notes/{id}"))
        .add_header("authorization", "Bearer sess-u1")
        .await;
    resp.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn preferences_and_view_state_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let state = test_state(&tmp);
    insert_user(&state, "u1", Tier::Free).await;
    let server = test_server(state);

    let resp = server
        .put("/api/preferences")
        .add_header("authorization", "Bearer sess-u1")
        .json(&serde_json::json!({ "theme": "dark" }))
        .await;
    resp.assert_status_ok();

    let resp =
        server.get("/api/preferences").add_header("authorization", "Bearer sess-u1").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["theme"], "dark");

    let resp = server
        .put("/api/view-state")
        .add_header("authorization", "Bearer sess-u1")
        .json(&serde_json::json!({ "zoom": 1.5 }))
        .await;
    resp.assert_status_ok();
    Ok(())
}
