// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use super::{ClaudeReport, ClaudeState, Location, Message, MetricsReport, RamMetrics};
use crate::envelope::Envelope;

#[test]
fn claude_states_payload_is_a_map_keyed_by_terminal_id() -> anyhow::Result<()> {
    let mut states = BTreeMap::new();
    states.insert(
        "t1".to_owned(),
        ClaudeReport {
            is_claude: true,
            state: ClaudeState::Idle,
            command: Some("claude".to_owned()),
            location: Some(Location { name: "beam".to_owned(), path: "/home/u/beam".to_owned() }),
            cwd: Some("/home/u/beam".to_owned()),
            claude_session_id: None,
            claude_session_name: None,
        },
    );
    let text = Envelope::new(Message::ClaudeStates(states)).to_text()?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(value["type"], "claude:states");
    assert_eq!(value["payload"]["t1"]["isClaude"], true);
    assert_eq!(value["payload"]["t1"]["state"], "idle");
    assert_eq!(value["payload"]["t1"]["location"]["name"], "beam");
    Ok(())
}

#[test]
fn metrics_cpu_null_when_unavailable() -> anyhow::Result<()> {
    let report = MetricsReport {
        ram: RamMetrics { total: 16, used: 8, available: 8 },
        cpu: None,
        gpu: None,
    };
    let value = serde_json::to_value(Envelope::new(Message::Metrics(report)))?;
    assert!(value["payload"]["cpu"].is_null());
    assert!(value["payload"].get("gpu").is_none());
    Ok(())
}

#[test]
fn claude_state_wire_names() {
    assert_eq!(ClaudeState::Permission.as_str(), "permission");
    assert_eq!(ClaudeState::Question.as_str(), "question");
    assert_eq!(ClaudeState::Working.as_str(), "working");
    assert_eq!(ClaudeState::Idle.as_str(), "idle");
}

#[test]
fn kind_matches_serde_tag_for_every_variant() -> anyhow::Result<()> {
    let ping = Envelope::new(Message::AgentPing(super::Empty {}));
    let value = serde_json::to_value(&ping)?;
    assert_eq!(value["type"], ping.message.kind());
    assert_eq!(value["payload"], serde_json::json!({}));
    Ok(())
}
