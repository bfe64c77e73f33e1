// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Envelope;
use crate::messages::{Message, TerminalAttach};
use crate::rest::{RestRequest, RestResponse};

#[test]
fn streaming_frame_omits_id() -> anyhow::Result<()> {
    let env = Envelope::new(Message::TerminalAttach(TerminalAttach {
        terminal_id: "t1".to_owned(),
        cols: 80,
        rows: 24,
        agent_id: None,
    }));
    let text = env.to_text()?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(value["type"], "terminal:attach");
    assert_eq!(value["payload"]["terminalId"], "t1");
    assert_eq!(value["payload"]["cols"], 80);
    assert!(value.get("id").is_none());
    Ok(())
}

#[test]
fn request_frame_round_trips_with_id() -> anyhow::Result<()> {
    let env = Envelope::with_id(
        Message::Request(RestRequest {
            method: "GET".to_owned(),
            path: "/api/terminals".to_owned(),
            body: None,
            agent_id: Some("a1".to_owned()),
        }),
        "req-42",
    );
    let parsed = Envelope::from_text(&env.to_text()?)?;
    assert_eq!(parsed.id.as_deref(), Some("req-42"));
    match parsed.message {
        Message::Request(req) => {
            assert_eq!(req.method, "GET");
            assert_eq!(req.agent_id.as_deref(), Some("a1"));
        }
        other => anyhow::bail!("unexpected message: {}", other.kind()),
    }
    Ok(())
}

#[test]
fn browser_json_parses_into_typed_payload() -> anyhow::Result<()> {
    let text = r#"{"type":"terminal:input","payload":{"terminalId":"t9","data":"aGk=","agentId":"a7"},"id":null}"#;
    // A null id is treated the same as an absent one.
    let env: Envelope = serde_json::from_str(text)?;
    assert!(env.id.is_none());
    assert_eq!(env.message.agent_id(), Some("a7"));
    match env.message {
        Message::TerminalInput(input) => {
            assert_eq!(input.terminal_id, "t9");
            assert_eq!(input.data, "aGk=");
        }
        other => anyhow::bail!("unexpected message: {}", other.kind()),
    }
    Ok(())
}

#[test]
fn response_payload_preserves_status_and_body() -> anyhow::Result<()> {
    let env = Envelope::with_id(
        Message::Response(RestResponse::error(403, "upgrade required")),
        "r1",
    );
    let value: serde_json::Value = serde_json::from_str(&env.to_text()?)?;
    assert_eq!(value["type"], "response");
    assert_eq!(value["payload"]["status"], 403);
    assert_eq!(value["payload"]["body"]["error"], "upgrade required");
    Ok(())
}
