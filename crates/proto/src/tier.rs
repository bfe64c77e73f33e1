// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription tiers and their pane/agent quotas.
//!
//! Billing integration is external; this module is the tier -> limits
//! lookup the relay gates writes against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Poweruser,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Poweruser => "poweruser",
        }
    }

    /// Quotas for this tier. `None` means unlimited.
    pub fn limits(&self) -> TierLimits {
        match self {
            Self::Free => TierLimits {
                agents: Some(1),
                terminal_panes: Some(7),
                file_panes: Some(10),
                note_panes: Some(10),
                git_graph_panes: Some(2),
                iframe_panes: Some(2),
            },
            Self::Pro => TierLimits {
                agents: Some(3),
                terminal_panes: Some(25),
                file_panes: Some(50),
                note_panes: Some(50),
                git_graph_panes: Some(10),
                iframe_panes: Some(10),
            },
            Self::Poweruser => TierLimits {
                agents: None,
                terminal_panes: None,
                file_panes: None,
                note_panes: None,
                git_graph_panes: None,
                iframe_panes: None,
            },
        }
    }
}

/// Per-tier quotas. `None` = unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub agents: Option<u32>,
    pub terminal_panes: Option<u32>,
    pub file_panes: Option<u32>,
    pub note_panes: Option<u32>,
    pub git_graph_panes: Option<u32>,
    pub iframe_panes: Option<u32>,
}

/// Gated creation features, one per pane-creating POST path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    TerminalPanes,
    FilePanes,
    NotePanes,
    GitGraphPanes,
    IframePanes,
}

impl Feature {
    /// Feature key used in 403 bodies and analytics events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminalPanes => "terminalPanes",
            Self::FilePanes => "filePanes",
            Self::NotePanes => "notePanes",
            Self::GitGraphPanes => "gitGraphPanes",
            Self::IframePanes => "iframePanes",
        }
    }

    /// The `PaneLayout.pane_type` value counted against this feature.
    pub fn pane_type(&self) -> &'static str {
        match self {
            Self::TerminalPanes => "terminal",
            Self::FilePanes => "file",
            Self::NotePanes => "note",
            Self::GitGraphPanes => "gitgraph",
            Self::IframePanes => "iframe",
        }
    }

    /// Per-tier quota for this feature.
    pub fn limit(&self, tier: Tier) -> Option<u32> {
        let limits = tier.limits();
        match self {
            Self::TerminalPanes => limits.terminal_panes,
            Self::FilePanes => limits.file_panes,
            Self::NotePanes => limits.note_panes,
            Self::GitGraphPanes => limits.git_graph_panes,
            Self::IframePanes => limits.iframe_panes,
        }
    }
}

/// Map a creation POST path to the feature it consumes, if gated.
pub fn creation_feature(path: &str) -> Option<Feature> {
    match path {
        "/api/terminals" => Some(Feature::TerminalPanes),
        "/api/file-panes" => Some(Feature::FilePanes),
        "/api/notes" => Some(Feature::NotePanes),
        "/api/git-graphs" => Some(Feature::GitGraphPanes),
        "/api/iframes" => Some(Feature::IframePanes),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tier_tests.rs"]
mod tests;
