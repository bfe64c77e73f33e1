// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent WebSocket endpoint (`/agent-ws`): first-frame token auth, tier
//! limit on concurrent agents, keep-alive pings, and frame routing.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use fortynine_proto::messages::{
    AgentAuthFail, AgentAuthOk, AgentPresence, Empty, Message,
};
use fortynine_proto::Envelope;

use crate::router::route_agent_frame;
use crate::state::RelayState;

/// The agent must authenticate within this window.
const AUTH_DEADLINE: Duration = Duration::from_secs(10);
/// Keep-alive ping cadence.
const PING_INTERVAL: Duration = Duration::from_secs(15);
/// A silent agent is declared dead after this long (>= 2x ping interval).
const PONG_DEADLINE: Duration = Duration::from_secs(45);

/// `GET /agent-ws` upgrade handler.
pub async fn agent_ws_handler(
    State(state): State<Arc<RelayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_agent(state, socket))
}

async fn handle_agent(state: Arc<RelayState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // First frame: authenticate.
    let auth = tokio::time::timeout(AUTH_DEADLINE, ws_rx.next()).await;
    let text = match auth {
        Ok(Some(Ok(WsMessage::Text(text)))) => text.to_string(),
        _ => {
            let _ = ws_tx.close().await;
            return;
        }
    };

    let auth_payload = match Envelope::from_text(&text) {
        Ok(Envelope { message: Message::AgentAuth(auth), .. }) => auth,
        _ => {
            let _ = send_env(&mut ws_tx, &auth_fail("expected agent:auth")).await;
            return;
        }
    };

    let Some(agent) = state.store.agent_by_token(&auth_payload.token).await else {
        let _ = send_env(&mut ws_tx, &auth_fail("unknown or revoked token")).await;
        return;
    };

    // Tier limit on concurrently connected agents.
    if let Some(user) = state.store.user_by_id(&agent.user_id).await {
        if let Some(limit) = user.tier.limits().agents {
            let connected = state.registry.agent_count(&user.id).await as u32;
            if connected >= limit {
                let _ = send_env(
                    &mut ws_tx,
                    &auth_fail(&format!("agent limit reached for the {} plan", user.tier.as_str())),
                )
                .await;
                state
                    .events
                    .record(&user.id, "tier.limit_hit", serde_json::json!({ "feature": "agents" }))
                    .await;
                return;
            }
        }
    }

    let user_id = agent.user_id.clone();
    let agent_id = agent.id.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.add_agent(&user_id, &agent_id, tx).await;
    let _ = state.store.touch_agent(&agent_id).await;

    let ok = Envelope::new(Message::AgentAuthOk(AgentAuthOk { agent_id: agent_id.clone() }));
    if send_env(&mut ws_tx, &ok).await.is_err() {
        state.registry.remove_agent(&user_id, &agent_id, conn_id).await;
        return;
    }
    info!(agent_id = %agent_id, hostname = %auth_payload.hostname, "agent authenticated");

    let online = Envelope::new(Message::AgentOnline(AgentPresence {
        agent_id: agent_id.clone(),
        hostname: Some(auth_payload.hostname.clone()),
    }));
    if let Ok(text) = online.to_text() {
        state.registry.broadcast_browsers(&user_id, &text).await;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(text) = outgoing else { break };
                if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PONG_DEADLINE {
                    debug!(agent_id = %agent_id, "agent missed pings; dropping connection");
                    break;
                }
                let ping = Envelope::new(Message::AgentPing(Empty {}));
                if send_env(&mut ws_tx, &ping).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(WsMessage::Text(text))) => text.to_string(),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(agent_id = %agent_id, err = %e, "agent transport error");
                        break;
                    }
                    _ => continue,
                };

                if let Ok(Envelope { message: Message::AgentPong(_), .. }) =
                    Envelope::from_text(&text)
                {
                    last_pong = tokio::time::Instant::now();
                    continue;
                }
                route_agent_frame(&state, &user_id, &text).await;
            }
        }
    }

    let none_left = state.registry.remove_agent(&user_id, &agent_id, conn_id).await;
    let _ = state.store.touch_agent(&agent_id).await;
    if none_left {
        let offline = Envelope::new(Message::AgentOffline(AgentPresence {
            agent_id: agent_id.clone(),
            hostname: None,
        }));
        if let Ok(text) = offline.to_text() {
            state.registry.broadcast_browsers(&user_id, &text).await;
        }
    }
    info!(agent_id = %agent_id, "agent disconnected");
}

fn auth_fail(reason: &str) -> Envelope {
    Envelope::new(Message::AgentAuthFail(AgentAuthFail { reason: reason.to_owned() }))
}

async fn send_env<S>(tx: &mut S, env: &Envelope) -> Result<(), ()>
where
    S: SinkExt<WsMessage> + Unpin,
{
    let text = env.to_text().map_err(|_| ())?;
    tx.send(WsMessage::Text(text.into())).await.map_err(|_| ())
}
