// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route table for the relay.

use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;
use crate::{http, ws_agent, ws_browser};

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/health", get(http::health))
        // Pairing
        .route("/api/agents/pair", post(http::pair_start))
        .route("/api/agents/approve", post(http::pair_approve))
        .route("/api/agents/pair-status", get(http::pair_status))
        // Cross-device persistence
        .route("/api/layout", get(http::layout_get).put(http::layout_put))
        .route("/api/layout/{id}", patch(http::layout_patch))
        .route("/api/notes", get(http::notes_get).post(http::notes_post))
        .route("/api/notes/{id}", put(http::notes_put).delete(http::notes_delete))
        .route("/api/preferences", get(http::preferences_get).put(http::preferences_put))
        .route("/api/view-state", get(http::view_state_get).put(http::view_state_put))
        .route("/api/messages", get(http::messages_get).post(http::messages_post))
        // Streams
        .route("/agent-ws", get(ws_agent::agent_ws_handler))
        .route("/browser-ws", get(ws_browser::browser_ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
