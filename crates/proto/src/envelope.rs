// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `{type, payload, id?}` envelope shared by every transport leg.
//!
//! `id` is present only on request/response traffic (and on `scan:partial`
//! frames, which borrow the id of the request they belong to). Streaming
//! messages omit it.

use serde::{Deserialize, Serialize};

use crate::messages::Message;

/// A single wire frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Envelope {
    /// Wrap a streaming message (no correlation id).
    pub fn new(message: Message) -> Self {
        Self { message, id: None }
    }

    /// Wrap a correlated message (request, response, or scan partial).
    pub fn with_id(message: Message, id: impl Into<String>) -> Self {
        Self { message, id: Some(id.into()) }
    }

    /// Serialize to a JSON text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON text frame.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
