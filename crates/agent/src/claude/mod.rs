// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude-state detection: every 2 seconds, classify each reserved-prefix
//! terminal and push a `claude:states` frame when anything observable
//! changed.

pub mod location;
pub mod process;
pub mod screen;
pub mod session;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fortynine_proto::messages::{ClaudeReport, ClaudeState, Message};

use crate::state_dir::home_dir;
use crate::terminal::tmux::{terminal_id, Tmux};
use crate::transport::Outbound;

use location::LocationCache;
use process::{is_claude_command, ProcessTable};
use session::{SessionIdCache, SessionNameCache};

/// Detector poll cadence.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Passes slower than this are logged.
const SLOW_PASS: Duration = Duration::from_millis(500);

/// Where the Claude CLI keeps its debug logs and transcripts.
#[derive(Debug, Clone)]
pub struct ClaudePaths {
    pub debug_dir: PathBuf,
    pub projects_dir: PathBuf,
}

impl ClaudePaths {
    pub fn from_home() -> anyhow::Result<Self> {
        let home = home_dir()?;
        Ok(Self {
            debug_dir: home.join(".claude").join("debug"),
            projects_dir: home.join(".claude").join("projects"),
        })
    }
}

pub struct ClaudeDetector {
    tmux: Tmux,
    paths: ClaudePaths,
    session_ids: SessionIdCache,
    session_names: SessionNameCache,
    locations: LocationCache,
    last: BTreeMap<String, ClaudeReport>,
    /// Latest full report, readable by the service surface.
    snapshot: Arc<RwLock<BTreeMap<String, ClaudeReport>>>,
    /// Pass guard: a tick that finds the previous pass still running is
    /// skipped, never queued.
    pass_guard: Arc<Mutex<()>>,
}

impl ClaudeDetector {
    pub fn new(tmux: Tmux, paths: ClaudePaths) -> Self {
        Self {
            tmux,
            paths,
            session_ids: SessionIdCache::default(),
            session_names: SessionNameCache::default(),
            locations: LocationCache::default(),
            last: BTreeMap::new(),
            snapshot: Arc::new(RwLock::new(BTreeMap::new())),
            pass_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Shared handle to the latest report map.
    pub fn snapshot_handle(&self) -> Arc<RwLock<BTreeMap<String, ClaudeReport>>> {
        Arc::clone(&self.snapshot)
    }

    /// Run the 2 s poll loop until shutdown.
    pub async fn run(mut self, outbound: Outbound, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let guard = Arc::clone(&self.pass_guard);
            let Ok(_pass) = guard.try_lock() else {
                debug!("previous detector pass still running; skipping tick");
                continue;
            };

            let started = tokio::time::Instant::now();
            let states = self.gather().await;
            let elapsed = started.elapsed();
            if elapsed > SLOW_PASS {
                warn!(elapsed_ms = elapsed.as_millis() as u64, "slow claude-state pass");
            }

            if states_changed(&self.last, &states) {
                let _ = outbound.send(Message::ClaudeStates(states.clone()));
            }
            *self.snapshot.write().await = states.clone();
            self.last = states;
        }
    }

    /// One detection pass over every reserved-prefix pane.
    pub async fn gather(&mut self) -> BTreeMap<String, ClaudeReport> {
        let mut states = BTreeMap::new();
        let panes = match self.tmux.list_panes().await {
            Ok(panes) => panes,
            Err(e) => {
                debug!(err = %e, "pane listing failed");
                return states;
            }
        };
        let panes: Vec<_> = panes
            .into_iter()
            .filter(|p| terminal_id(&p.session_name).is_some())
            .collect();
        if panes.is_empty() {
            return states;
        }

        let table = ProcessTable::snapshot().await;

        for pane in panes {
            let Some(id) = terminal_id(&pane.session_name) else { continue };

            let (is_claude, command, claude_pid) = if is_claude_command(&pane.current_command) {
                (true, Some(pane.current_command.clone()), Some(pane.pane_pid))
            } else if let Some((pid, cmd)) = table.find_claude_descendant(pane.pane_pid) {
                (true, Some(cmd), Some(pid))
            } else {
                (false, Some(pane.current_command.clone()), None)
            };

            let state = if is_claude {
                match self.tmux.capture_screen(&pane.session_name).await {
                    Ok(screen_text) => screen::classify_screen(&screen_text),
                    Err(_) => ClaudeState::Working,
                }
            } else {
                ClaudeState::Idle
            };

            let location = Some(self.locations.resolve(&pane.current_path));

            let claude_session_id = match claude_pid {
                Some(pid) => self.session_ids.lookup(pid, &self.paths.debug_dir).await,
                None => None,
            };
            let claude_session_name = match claude_session_id.as_deref() {
                Some(sid) => {
                    self.session_names
                        .resolve(&self.paths.projects_dir, &pane.current_path, sid)
                        .await
                }
                None => None,
            };

            states.insert(
                id.to_owned(),
                ClaudeReport {
                    is_claude,
                    state,
                    command,
                    location,
                    cwd: Some(pane.current_path.clone()),
                    claude_session_id,
                    claude_session_name,
                },
            );
        }
        states
    }
}

/// A push is warranted when `isClaude`, `state`, or `location.name` changed
/// for any terminal (including appear/disappear).
pub fn states_changed(
    prev: &BTreeMap<String, ClaudeReport>,
    next: &BTreeMap<String, ClaudeReport>,
) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    for (id, report) in next {
        match prev.get(id) {
            None => return true,
            Some(old) => {
                if old.is_claude != report.is_claude
                    || old.state != report.state
                    || location_name(old) != location_name(report)
                {
                    return true;
                }
            }
        }
    }
    false
}

fn location_name(report: &ClaudeReport) -> Option<&str> {
    report.location.as_ref().map(|l| l.name.as_str())
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
