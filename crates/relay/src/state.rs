// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::events::EventLog;
use crate::pairing::PairingPool;
use crate::registry::{BrowserId, Registry};
use crate::store::Store;

/// Where a pending request's response must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRoute {
    pub user_id: String,
    pub browser_id: BrowserId,
}

/// Shared relay state.
pub struct RelayState {
    pub config: RelayConfig,
    pub store: Store,
    pub registry: Registry,
    pub pairing: Arc<PairingPool>,
    pub events: EventLog,
    /// In-flight request ids -> originating browser. Entries are removed
    /// when the authoritative response passes through, or dropped silently
    /// if the browser went away.
    pub pending: Mutex<HashMap<String, PendingRoute>>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.data_dir)?;
        let events = EventLog::open(&config.data_dir);
        Ok(Self {
            config,
            store,
            registry: Registry::new(),
            pairing: Arc::new(PairingPool::new()),
            events,
            pending: Mutex::new(HashMap::new()),
        })
    }
}
