// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fortynine_proto::messages::{Empty, Message};

use super::{outbound_channel, Backoff};

#[test]
fn backoff_doubles_to_cap() {
    let mut backoff = Backoff::new();
    let delays: Vec<u64> =
        (0..7).map(|_| backoff.next_delay().as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
}

#[test]
fn backoff_resets_after_successful_auth() {
    let mut backoff = Backoff::new();
    for _ in 0..5 {
        backoff.next_delay();
    }
    backoff.reset();
    assert_eq!(backoff.next_delay().as_secs(), 1);
    assert_eq!(backoff.next_delay().as_secs(), 2);
}

#[tokio::test]
async fn send_returns_false_when_not_connected() {
    let (outbound, mut rx) = outbound_channel();
    assert!(!outbound.is_connected());
    assert!(!outbound.send(Message::AgentPing(Empty {})));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn send_delivers_when_connected() -> anyhow::Result<()> {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    assert!(outbound.send(Message::AgentPing(Empty {})));
    let env = rx.try_recv()?;
    assert_eq!(env.message.kind(), "agent:ping");
    assert!(env.id.is_none());
    Ok(())
}

#[tokio::test]
async fn send_with_id_carries_correlation() -> anyhow::Result<()> {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    assert!(outbound.send_with_id(
        Message::ScanPartial(serde_json::json!({"path": "/tmp/x"})),
        "req-7"
    ));
    let env = rx.try_recv()?;
    assert_eq!(env.id.as_deref(), Some("req-7"));
    Ok(())
}
