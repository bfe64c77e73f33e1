// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's local service surface, invoked through the request/response
//! multiplex.

pub mod files;
pub mod git;
pub mod issues;
pub mod panes;
pub mod repos;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use fortynine_proto::messages::ClaudeReport;

use crate::config::AgentConfig;
use crate::metrics::MetricsCollector;
use crate::state_dir::StateDir;
use crate::terminal::tmux::Tmux;
use crate::terminal::TerminalManager;

use panes::PaneStores;

/// Everything the request router can reach.
pub struct Services {
    pub config: AgentConfig,
    pub state: StateDir,
    pub tmux: Tmux,
    pub terminals: Arc<TerminalManager>,
    pub panes: PaneStores,
    pub claude_states: Arc<RwLock<BTreeMap<String, ClaudeReport>>>,
    pub metrics: Arc<Mutex<MetricsCollector>>,
}
