// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser WebSocket endpoint (`/browser-ws`): session auth via cookie,
//! bearer header, or `?token=`, then bidirectional routing against the
//! user's agents.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::auth;
use crate::router::route_browser_frame;
use crate::state::RelayState;
use crate::store::User;

#[derive(Debug, Deserialize)]
pub struct BrowserWsQuery {
    pub token: Option<String>,
}

/// `GET /browser-ws` upgrade handler.
pub async fn browser_ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<BrowserWsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user = match query.token {
        Some(ref token) => auth::browser_user_from_token(&state, token).await,
        None => auth::browser_user(&state, &headers).await,
    };
    let Some(user) = user else {
        return axum::http::Response::builder()
            .status(401)
            .body(axum::body::Body::from("unauthorized"))
            .unwrap_or_default()
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_browser(state, user, socket)).into_response()
}

async fn handle_browser(state: Arc<RelayState>, user: User, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let browser_id = state.registry.add_browser(&user.id, tx).await;
    debug!(user_id = %user.id, browser_id, "browser connected");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(text) = outgoing else { break };
                if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        route_browser_frame(&state, &user, browser_id, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(user_id = %user.id, err = %e, "browser transport error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.registry.remove_browser(&user.id, browser_id).await;
    // In-flight responses for this browser are dropped silently.
    state
        .pending
        .lock()
        .await
        .retain(|_, route| !(route.user_id == user.id && route.browser_id == browser_id));
    debug!(user_id = %user.id, browser_id, "browser disconnected");
}
