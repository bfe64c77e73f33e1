// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers: pairing, and the cloud-authoritative persistence surface
//! (layout, notes, preferences, view state, messages).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth;
use crate::error::RelayError;
use crate::pairing::{PollOutcome, CODE_TTL};
use crate::state::RelayState;
use crate::store::{CloudNote, PaneLayout, User};

// -- Request/response types ----------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub hostname: String,
    pub os: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub code: String,
    pub pair_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PairStatusQuery {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LayoutPut {
    pub panes: Vec<PaneLayout>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePost {
    pub text: String,
}

// -- Helpers --------------------------------------------------------------

async fn require_user(
    state: &RelayState,
    headers: &HeaderMap,
) -> Result<User, axum::response::Response> {
    match auth::browser_user(state, headers).await {
        Some(user) => Ok(user),
        None => Err(RelayError::Unauthorized.to_http_response("login required").into_response()),
    }
}

// -- Handlers -------------------------------------------------------------

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned() })
}

/// `POST /api/agents/pair` — agent-side pairing start. Unauthenticated by
/// design; approval binds the code to a user.
pub async fn pair_start(
    State(state): State<Arc<RelayState>>,
    Json(req): Json<PairRequest>,
) -> impl IntoResponse {
    match state.pairing.start(&req.hostname, &req.os, &req.version).await {
        Ok(code) => {
            let pair_url = format!("{}/pair?code={}", state.config.public_base(), code);
            Json(PairResponse { code, pair_url, expires_in: CODE_TTL.as_secs() }).into_response()
        }
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `POST /api/agents/approve` — browser-side approval. Creates the
/// persistent agent row and mints its long-lived token; only the token's
/// hash is stored.
pub async fn pair_approve(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(req): Json<ApproveRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let Some(entry) = state.pairing.pending(&req.code).await else {
        return RelayError::NotFound
            .to_http_response("unknown or expired pairing code")
            .into_response();
    };

    let token = mint_agent_token();
    let agent = match state
        .store
        .upsert_agent(&user.id, &entry.hostname, &entry.os, &entry.version, &token)
        .await
    {
        Ok(agent) => agent,
        Err(e) => return RelayError::Internal.to_http_response(e.to_string()).into_response(),
    };

    if !state.pairing.approve(&req.code, &user.id, &token, &agent.id).await {
        return RelayError::Gone.to_http_response("pairing code expired").into_response();
    }

    state
        .events
        .record(&user.id, "agent.paired", serde_json::json!({ "hostname": entry.hostname }))
        .await;
    info!(user_id = %user.id, agent_id = %agent.id, "pairing approved");
    Json(serde_json::json!({ "ok": true, "agentId": agent.id })).into_response()
}

/// `GET /api/agents/pair-status?code=` — agent poll. The poll that observes
/// approval consumes the code; later polls see 404.
pub async fn pair_status(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<PairStatusQuery>,
) -> impl IntoResponse {
    match state.pairing.poll(&query.code).await {
        PollOutcome::Pending => Json(serde_json::json!({ "status": "pending" })).into_response(),
        PollOutcome::Approved { token, agent_id } => Json(serde_json::json!({
            "status": "approved",
            "token": token,
            "agentId": agent_id,
        }))
        .into_response(),
        PollOutcome::Expired => {
            RelayError::Gone.to_http_response("pairing code expired").into_response()
        }
        PollOutcome::NotFound => {
            RelayError::NotFound.to_http_response("unknown pairing code").into_response()
        }
    }
}

/// `GET /api/layout`
pub async fn layout_get(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let panes = state.store.layouts_for_user(&user.id).await;
    Json(serde_json::json!({ "panes": panes })).into_response()
}

/// `PUT /api/layout` — atomic full-layout replace.
pub async fn layout_put(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(body): Json<LayoutPut>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.put_layout(&user.id, body.panes).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `PATCH /api/layout/{id}` — drag/resize patch for one pane.
pub async fn layout_patch(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.patch_layout(&user.id, &id, &patch).await {
        Ok(Some(row)) => Json(row).into_response(),
        Ok(None) => RelayError::NotFound.to_http_response("unknown pane").into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/notes` — cloud-authoritative notes.
pub async fn notes_get(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    Json(serde_json::json!({ "notes": state.store.notes_for_user(&user.id).await }))
        .into_response()
}

/// `POST /api/notes` / `PUT /api/notes/{id}`
pub async fn notes_post(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(mut note): Json<CloudNote>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    note.user_id = user.id.clone();
    match state.store.put_note(note).await {
        Ok(saved) => Json(saved).into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

pub async fn notes_put(
    state: State<Arc<RelayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut note): Json<CloudNote>,
) -> impl IntoResponse {
    note.id = id;
    notes_post(state, headers, Json(note)).await
}

/// `DELETE /api/notes/{id}`
pub async fn notes_delete(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.delete_note(&user.id, &id).await {
        Ok(true) => Json(serde_json::json!({ "ok": true })).into_response(),
        Ok(false) => RelayError::NotFound.to_http_response("unknown note").into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/preferences` / `PUT /api/preferences`
pub async fn preferences_get(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    Json(state.store.preferences(&user.id).await).into_response()
}

pub async fn preferences_put(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(value): Json<serde_json::Value>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.put_preferences(&user.id, value).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/view-state` / `PUT /api/view-state`
pub async fn view_state_get(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    Json(state.store.view_state(&user.id).await).into_response()
}

pub async fn view_state_put(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(value): Json<serde_json::Value>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.put_view_state(&user.id, value).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/messages` / `POST /api/messages`
pub async fn messages_get(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    Json(serde_json::json!({ "messages": state.store.messages_for_user(&user.id).await }))
        .into_response()
}

pub async fn messages_post(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(body): Json<MessagePost>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.append_message(&user.id, "user", &body.text).await {
        Ok(message) => Json(message).into_response(),
        Err(e) => RelayError::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// Long-lived agent bearer token.
fn mint_agent_token() -> String {
    format!(
        "49a_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
