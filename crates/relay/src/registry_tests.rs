// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::Registry;

#[tokio::test]
async fn broadcast_reaches_every_browser_of_the_user() -> anyhow::Result<()> {
    let registry = Registry::new();
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let (tx_other, mut rx_other) = mpsc::unbounded_channel();
    registry.add_browser("u1", tx1).await;
    registry.add_browser("u1", tx2).await;
    registry.add_browser("u2", tx_other).await;

    registry.broadcast_browsers("u1", "hello").await;
    assert_eq!(rx1.try_recv()?, "hello");
    assert_eq!(rx2.try_recv()?, "hello");
    assert!(rx_other.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn send_to_browser_targets_one_connection() -> anyhow::Result<()> {
    let registry = Registry::new();
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let id1 = registry.add_browser("u1", tx1).await;
    registry.add_browser("u1", tx2).await;

    assert!(registry.send_to_browser("u1", id1, "direct".to_owned()).await);
    assert_eq!(rx1.try_recv()?, "direct");
    assert!(rx2.try_recv().is_err());

    registry.remove_browser("u1", id1).await;
    assert!(!registry.send_to_browser("u1", id1, "late".to_owned()).await);
    Ok(())
}

#[tokio::test]
async fn agent_ownership_is_per_user() -> anyhow::Result<()> {
    let registry = Registry::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    registry.add_agent("u1", "a1", tx).await;

    assert!(registry.has_agent("u1", "a1").await);
    assert!(!registry.has_agent("u2", "a1").await);
    assert_eq!(registry.agent_count("u1").await, 1);
    Ok(())
}

#[tokio::test]
async fn last_agent_removal_is_reported() -> anyhow::Result<()> {
    let registry = Registry::new();
    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let conn1 = registry.add_agent("u1", "a1", tx1).await;
    let conn2 = registry.add_agent("u1", "a2", tx2).await;

    assert!(!registry.remove_agent("u1", "a1", conn1).await);
    assert!(registry.remove_agent("u1", "a2", conn2).await);
    Ok(())
}

#[tokio::test]
async fn superseded_connection_cannot_evict_its_replacement() -> anyhow::Result<()> {
    let registry = Registry::new();
    let (tx_old, _rx_old) = mpsc::unbounded_channel();
    let (tx_new, mut rx_new) = mpsc::unbounded_channel();
    let old_conn = registry.add_agent("u1", "a1", tx_old).await;
    let _new_conn = registry.add_agent("u1", "a1", tx_new).await;

    // The old connection's cleanup runs after the reconnect; the live
    // slot must survive it.
    registry.remove_agent("u1", "a1", old_conn).await;
    assert!(registry.has_agent("u1", "a1").await);
    assert!(registry.send_to_agent("u1", "a1", "ping".to_owned()).await);
    assert_eq!(rx_new.try_recv()?, "ping");
    Ok(())
}
