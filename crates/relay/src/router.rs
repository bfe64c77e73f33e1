// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The routing core: browser frames fan in to a specific agent, agent
//! frames fan back to the originating browser (by correlation id) or to
//! all of the user's browsers (unsolicited pushes). Creation POSTs are
//! tier-gated before anything reaches an agent.

use tracing::debug;

use fortynine_proto::messages::Message;
use fortynine_proto::rest::{split_query, RestResponse};
use fortynine_proto::tier::creation_feature;
use fortynine_proto::Envelope;

use crate::registry::BrowserId;
use crate::state::{PendingRoute, RelayState};
use crate::store::User;

/// Handle one frame from a browser connection.
pub async fn route_browser_frame(
    state: &RelayState,
    user: &User,
    browser_id: BrowserId,
    text: &str,
) {
    let env = match Envelope::from_text(text) {
        Ok(env) => env,
        Err(e) => {
            debug!(err = %e, "unparseable browser frame");
            send_error(state, user, browser_id, None, 400, "invalid message").await;
            return;
        }
    };

    // Tier gating: a creation POST that would cross the user's quota is
    // answered here with a synthetic 403; the agent never sees it.
    if let Message::Request(ref req) = env.message {
        if req.method.eq_ignore_ascii_case("POST") {
            let (route, _) = split_query(&req.path);
            if let Some(feature) = creation_feature(route) {
                let count = state.store.count_panes(&user.id, feature.pane_type()).await;
                if let Some(limit) = feature.limit(user.tier) {
                    if count >= limit {
                        let body = serde_json::json!({
                            "feature": feature.as_str(),
                            "message": format!(
                                "You've reached the {} limit for the {} plan. Upgrade for more.",
                                feature.as_str(),
                                user.tier.as_str(),
                            ),
                            "upgradeUrl": state.config.upgrade_url(),
                        });
                        let response = Envelope {
                            message: Message::Response(RestResponse { status: 403, body }),
                            id: env.id.clone(),
                        };
                        deliver_to_browser(state, user, browser_id, &response).await;
                        state
                            .events
                            .record(
                                &user.id,
                                "tier.limit_hit",
                                serde_json::json!({
                                    "feature": feature.as_str(),
                                    "tier": user.tier.as_str(),
                                    "count": count,
                                }),
                            )
                            .await;
                        return;
                    }
                }
            }
        }
    }

    // Target selection: every browser-originated frame names its agent.
    let Some(agent_id) = env.message.agent_id().map(str::to_owned) else {
        send_error(state, user, browser_id, env.id.clone(), 400, "agentId is required").await;
        return;
    };

    // Ownership check before anything is forwarded.
    if !state.registry.has_agent(&user.id, &agent_id).await {
        send_error(state, user, browser_id, env.id.clone(), 404, "agent not connected").await;
        return;
    }

    // Requests get a pending route so the response finds its way back to
    // this browser only.
    if matches!(env.message, Message::Request(_)) {
        if let Some(id) = env.id.clone() {
            state
                .pending
                .lock()
                .await
                .insert(id, PendingRoute { user_id: user.id.clone(), browser_id });
        }
    }

    // Forward verbatim, preserving the id.
    if !state.registry.send_to_agent(&user.id, &agent_id, text.to_owned()).await {
        if let Some(id) = &env.id {
            state.pending.lock().await.remove(id);
        }
        send_error(state, user, browser_id, env.id, 502, "agent connection lost").await;
    }
}

/// Handle one frame from an authenticated agent connection.
pub async fn route_agent_frame(state: &RelayState, user_id: &str, text: &str) {
    let env = match Envelope::from_text(text) {
        Ok(env) => env,
        Err(e) => {
            debug!(err = %e, "unparseable agent frame");
            return;
        }
    };

    match (&env.message, &env.id) {
        // The authoritative response consumes the pending route. A detached
        // browser means the response is dropped silently.
        (Message::Response(_), Some(id)) => {
            let route = state.pending.lock().await.remove(id);
            match route {
                Some(route) => {
                    let _ = state
                        .registry
                        .send_to_browser(&route.user_id, route.browser_id, text.to_owned())
                        .await;
                }
                None => debug!(id = %id, "response for unknown request id"),
            }
        }
        // Partials flow to the originator without consuming the route.
        (Message::ScanPartial(_), Some(id)) => {
            let route = state.pending.lock().await.get(id).cloned();
            if let Some(route) = route {
                let _ = state
                    .registry
                    .send_to_browser(&route.user_id, route.browser_id, text.to_owned())
                    .await;
            }
        }
        // Everything else is an unsolicited push: fan out.
        _ => {
            state.registry.broadcast_browsers(user_id, text).await;
        }
    }
}

async fn deliver_to_browser(
    state: &RelayState,
    user: &User,
    browser_id: BrowserId,
    env: &Envelope,
) {
    if let Ok(text) = env.to_text() {
        let _ = state.registry.send_to_browser(&user.id, browser_id, text).await;
    }
}

async fn send_error(
    state: &RelayState,
    user: &User,
    browser_id: BrowserId,
    id: Option<String>,
    status: u16,
    message: &str,
) {
    let env = Envelope {
        message: Message::Response(RestResponse::error(status, message)),
        id,
    };
    deliver_to_browser(state, user, browser_id, &env).await;
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
