// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser authentication: a session token presented as a `session`
//! cookie, a bearer header, or (for WebSocket upgrades) a query parameter.
//! Token issuance belongs to the identity provider; the relay only matches
//! stored session tokens.

use axum::http::HeaderMap;

use crate::state::RelayState;
use crate::store::User;

/// Extract the session token from request headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_owned());
        }
    }
    let cookies = headers.get("cookie").and_then(|v| v.to_str().ok())?;
    cookie_value(cookies, "session")
}

/// Pull one cookie's value out of a `Cookie:` header.
pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    for pair in cookies.split(';') {
        let Some((key, value)) = pair.split_once('=') else { continue };
        if key.trim() == name {
            return Some(value.trim().to_owned());
        }
    }
    None
}

/// Resolve the authenticated browser user, if any.
pub async fn browser_user(state: &RelayState, headers: &HeaderMap) -> Option<User> {
    let token = session_token(headers)?;
    state.store.user_by_session_token(&token).await
}

/// Resolve a browser user from an explicit token (WebSocket query).
pub async fn browser_user_from_token(state: &RelayState, token: &str) -> Option<User> {
    state.store.user_by_session_token(token).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
