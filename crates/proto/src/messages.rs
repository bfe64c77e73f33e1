// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed message set. Variant names are wire-stable strings; payload
//! fields are camelCase because the browser consumes them directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rest::{RestRequest, RestResponse};

/// Every message that can appear inside an [`crate::Envelope`].
///
/// There is no ordering guarantee between distinct types; ordering is
/// FIFO per type per direction on a single stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    // -- Agent <-> relay session ------------------------------------------
    #[serde(rename = "agent:auth")]
    AgentAuth(AgentAuth),
    #[serde(rename = "agent:auth:ok")]
    AgentAuthOk(AgentAuthOk),
    #[serde(rename = "agent:auth:fail")]
    AgentAuthFail(AgentAuthFail),
    #[serde(rename = "agent:ping")]
    AgentPing(Empty),
    #[serde(rename = "agent:pong")]
    AgentPong(AgentPong),
    /// Relay -> browsers: an agent came online.
    #[serde(rename = "agent:online")]
    AgentOnline(AgentPresence),
    /// Relay -> browsers: the user's last agent went away.
    #[serde(rename = "agent:offline")]
    AgentOffline(AgentPresence),

    // -- Terminal streaming ------------------------------------------------
    #[serde(rename = "terminal:attach")]
    TerminalAttach(TerminalAttach),
    #[serde(rename = "terminal:history")]
    TerminalHistory(TerminalData),
    #[serde(rename = "terminal:attached")]
    TerminalAttached(TerminalGeometry),
    #[serde(rename = "terminal:output")]
    TerminalOutput(TerminalData),
    #[serde(rename = "terminal:input")]
    TerminalInput(TerminalData),
    #[serde(rename = "terminal:resize")]
    TerminalResize(TerminalGeometry),
    #[serde(rename = "terminal:scroll")]
    TerminalScroll(TerminalScroll),
    #[serde(rename = "terminal:close")]
    TerminalClose(TerminalRef),
    #[serde(rename = "terminal:closed")]
    TerminalClosed(TerminalRef),
    #[serde(rename = "terminal:detach")]
    TerminalDetach(TerminalRef),
    #[serde(rename = "terminal:error")]
    TerminalError(TerminalErrorMsg),
    #[serde(rename = "terminal:resume")]
    TerminalResume(TerminalResume),
    #[serde(rename = "terminal:resumed")]
    TerminalResumed(TerminalResumed),

    // -- Periodic pushes ---------------------------------------------------
    /// Per-terminal Claude classification, keyed by terminal id.
    #[serde(rename = "claude:states")]
    ClaudeStates(BTreeMap<String, ClaudeReport>),
    #[serde(rename = "metrics")]
    Metrics(MetricsReport),

    // -- REST-over-stream --------------------------------------------------
    #[serde(rename = "request")]
    Request(RestRequest),
    #[serde(rename = "response")]
    Response(RestResponse),
    /// Streaming partial tied to a pending request id. Never follows the
    /// final `response` with the same id.
    #[serde(rename = "scan:partial")]
    ScanPartial(serde_json::Value),
}

impl Message {
    /// Wire-stable type string, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentAuth(_) => "agent:auth",
            Self::AgentAuthOk(_) => "agent:auth:ok",
            Self::AgentAuthFail(_) => "agent:auth:fail",
            Self::AgentPing(_) => "agent:ping",
            Self::AgentPong(_) => "agent:pong",
            Self::AgentOnline(_) => "agent:online",
            Self::AgentOffline(_) => "agent:offline",
            Self::TerminalAttach(_) => "terminal:attach",
            Self::TerminalHistory(_) => "terminal:history",
            Self::TerminalAttached(_) => "terminal:attached",
            Self::TerminalOutput(_) => "terminal:output",
            Self::TerminalInput(_) => "terminal:input",
            Self::TerminalResize(_) => "terminal:resize",
            Self::TerminalScroll(_) => "terminal:scroll",
            Self::TerminalClose(_) => "terminal:close",
            Self::TerminalClosed(_) => "terminal:closed",
            Self::TerminalDetach(_) => "terminal:detach",
            Self::TerminalError(_) => "terminal:error",
            Self::TerminalResume(_) => "terminal:resume",
            Self::TerminalResumed(_) => "terminal:resumed",
            Self::ClaudeStates(_) => "claude:states",
            Self::Metrics(_) => "metrics",
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::ScanPartial(_) => "scan:partial",
        }
    }

    /// The target agent id for browser-originated frames, if any.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Request(r) => r.agent_id.as_deref(),
            Self::TerminalAttach(p) => p.agent_id.as_deref(),
            Self::TerminalInput(p) => p.agent_id.as_deref(),
            Self::TerminalResize(p) => p.agent_id.as_deref(),
            Self::TerminalScroll(p) => p.agent_id.as_deref(),
            Self::TerminalClose(p) => p.agent_id.as_deref(),
            Self::TerminalDetach(p) => p.agent_id.as_deref(),
            Self::TerminalResume(p) => p.agent_id.as_deref(),
            _ => None,
        }
    }
}

/// Empty payload (`{}` on the wire).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAuth {
    pub token: String,
    pub hostname: String,
    pub os: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAuthOk {
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAuthFail {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPong {
    /// Agent-local epoch millis at reply time.
    pub ts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPresence {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalAttach {
    pub terminal_id: String,
    pub cols: u16,
    pub rows: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// Base64-encoded bytes for a terminal (history, output, or input).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalData {
    pub terminal_id: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalGeometry {
    pub terminal_id: String,
    pub cols: u16,
    pub rows: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalScroll {
    pub terminal_id: String,
    /// Positive scrolls up (into history), negative scrolls down.
    pub lines: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRef {
    pub terminal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalErrorMsg {
    pub terminal_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalResume {
    pub terminal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalResumed {
    pub terminal_id: String,
    pub session_name: String,
}

/// High-level Claude activity states derived from the visible screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaudeState {
    Idle,
    Working,
    Permission,
    Question,
}

impl ClaudeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Permission => "permission",
            Self::Question => "question",
        }
    }
}

/// Per-terminal detector report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaudeReport {
    pub is_claude: bool,
    pub state: ClaudeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_session_name: Option<String>,
}

/// A human-meaningful place on disk (repo or directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub ram: RamMetrics,
    /// Whole-percent CPU utilization, or null when unavailable.
    pub cpu: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RamMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuMetrics {
    pub utilization: u8,
    /// Bytes.
    pub mem_used: u64,
    /// Bytes.
    pub mem_total: u64,
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
