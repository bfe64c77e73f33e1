// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal lifecycle: persistent records, startup reconciliation, and the
//! attach/history/live/detach pipeline over per-session bridges.

pub mod bridge;
pub mod stream;
pub mod tmux;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use fortynine_proto::messages::{
    Message, TerminalData, TerminalErrorMsg, TerminalGeometry, TerminalRef, TerminalResumed,
};

use crate::state_dir::{home_dir, StateDir};
use crate::transport::Outbound;

use bridge::BridgeSpawner;
use stream::{Attachment, BridgeFrame};
use tmux::{session_name, terminal_id, Tmux};

/// Scroll requests are clamped to this many lines per call.
pub const SCROLL_CLAMP: i32 = 15;

/// Delay before the post-attach force-redraw nudge.
const FORCE_REDRAW_DELAY: Duration = Duration::from_millis(200);

/// Default geometry for sessions created before any viewport attaches.
const DEFAULT_COLS: u16 = 200;
const DEFAULT_ROWS: u16 = 50;

/// A persistent terminal, stable across agent restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRecord {
    pub id: String,
    pub session_name: String,
    pub working_dir: String,
    pub device: String,
}

/// On-disk `terminals.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalsDoc {
    pub version: u32,
    pub terminals: BTreeMap<String, TerminalRecord>,
}

impl Default for TerminalsDoc {
    fn default() -> Self {
        Self { version: 1, terminals: BTreeMap::new() }
    }
}

pub struct TerminalManager {
    tmux: Tmux,
    state: StateDir,
    spawner: BridgeSpawner,
    outbound: Outbound,
    device: String,
    records: RwLock<BTreeMap<String, TerminalRecord>>,
    active: Mutex<HashMap<String, Arc<Attachment>>>,
    /// Per-terminal attach guards: concurrent attaches for the same id
    /// coalesce on this lock instead of racing to spawn bridges.
    attach_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TerminalManager {
    pub fn new(
        tmux: Tmux,
        state: StateDir,
        spawner: BridgeSpawner,
        outbound: Outbound,
        device: String,
    ) -> Self {
        Self {
            tmux,
            state,
            spawner,
            outbound,
            device,
            records: RwLock::new(BTreeMap::new()),
            active: Mutex::new(HashMap::new()),
            attach_locks: Mutex::new(HashMap::new()),
        }
    }

    // -- Records & reconciliation -----------------------------------------

    /// Load records, adopt live `tc2-*` sessions that have no record, and
    /// drop records whose session is gone.
    pub async fn reconcile(&self) -> anyhow::Result<()> {
        let doc: TerminalsDoc = self.state.load_doc("terminals.json")?;
        let mut records = doc.terminals;

        let sessions = self.tmux.list_sessions().await.unwrap_or_default();
        let live: Vec<&str> = sessions.iter().filter_map(|s| terminal_id(s)).collect();

        for id in &live {
            if !records.contains_key(*id) {
                info!(terminal_id = %id, "adopting existing session");
                records.insert(
                    (*id).to_owned(),
                    TerminalRecord {
                        id: (*id).to_owned(),
                        session_name: session_name(id),
                        working_dir: String::new(),
                        device: self.device.clone(),
                    },
                );
            }
        }

        let stale: Vec<String> = records
            .keys()
            .filter(|id| !live.contains(&id.as_str()))
            .cloned()
            .collect();
        for id in &stale {
            info!(terminal_id = %id, "dropping record with no session");
            records.remove(id);
        }

        *self.records.write().await = records;
        self.persist().await
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let records = self.records.read().await.clone();
        self.state.save_doc("terminals.json", &TerminalsDoc { version: 1, terminals: records })
    }

    pub async fn list(&self) -> Vec<TerminalRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<TerminalRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Create a terminal: new record + new tmux session.
    pub async fn create(&self, working_dir: &str) -> anyhow::Result<TerminalRecord> {
        let dir = resolve_working_dir(working_dir)?;
        let id = new_terminal_id();
        let session = session_name(&id);
        self.tmux
            .new_session(&session, &dir.to_string_lossy(), DEFAULT_COLS, DEFAULT_ROWS)
            .await?;

        let record = TerminalRecord {
            id: id.clone(),
            session_name: session,
            working_dir: dir.to_string_lossy().into_owned(),
            device: self.device.clone(),
        };
        self.records.write().await.insert(id, record.clone());
        self.persist().await?;
        Ok(record)
    }

    /// Delete a terminal: tear down its bridge and session, drop the record.
    pub async fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let record = self.records.write().await.remove(id);
        let Some(record) = record else { return Ok(false) };

        if let Some(attachment) = self.active.lock().await.remove(id) {
            attachment.close();
        }
        self.spawner.release(&record.session_name).await;
        if self.tmux.has_session(&record.session_name).await {
            let _ = self.tmux.kill_session(&record.session_name).await;
        }
        self.persist().await?;
        Ok(true)
    }

    /// Resume a dead terminal: start a fresh session under the same id.
    pub async fn resume(
        &self,
        id: &str,
        working_dir: Option<&str>,
    ) -> anyhow::Result<TerminalRecord> {
        let session = session_name(id);
        let existing = self.get(id).await;

        let dir = match working_dir {
            Some(dir) => resolve_working_dir(dir)?,
            None => match existing.as_ref().filter(|r| !r.working_dir.is_empty()) {
                Some(r) => PathBuf::from(&r.working_dir),
                None => home_dir()?,
            },
        };

        if !self.tmux.has_session(&session).await {
            self.tmux
                .new_session(&session, &dir.to_string_lossy(), DEFAULT_COLS, DEFAULT_ROWS)
                .await?;
        }

        let record = TerminalRecord {
            id: id.to_owned(),
            session_name: session.clone(),
            working_dir: dir.to_string_lossy().into_owned(),
            device: self.device.clone(),
        };
        self.records.write().await.insert(id.to_owned(), record.clone());
        self.persist().await?;

        let _ = self.outbound.send(Message::TerminalResumed(TerminalResumed {
            terminal_id: id.to_owned(),
            session_name: session,
        }));
        Ok(record)
    }

    // -- Attach pipeline ---------------------------------------------------

    /// Attach a viewport: replay history, then live output, in that order.
    pub async fn attach(self: &Arc<Self>, id: &str, cols: u16, rows: u16) {
        // Coalesce concurrent attaches for the same terminal.
        let guard = {
            let mut locks = self.attach_locks.lock().await;
            Arc::clone(locks.entry(id.to_owned()).or_default())
        };
        let _held = guard.lock().await;

        if let Err(e) = self.attach_inner(id, cols, rows).await {
            warn!(terminal_id = %id, err = %e, "attach failed");
            self.send_error(id, &e.to_string());
        }
    }

    async fn attach_inner(self: &Arc<Self>, id: &str, cols: u16, rows: u16) -> anyhow::Result<()> {
        let record = self
            .get(id)
            .await
            .ok_or_else(|| anyhow::anyhow!("unknown terminal '{id}'"))?;
        let session = record.session_name.clone();

        let attachment = self.ensure_attachment(id, &session).await?;

        // Buffer live output while the history capture is in flight.
        attachment.pending.begin();

        let result = self.replay_history(id, &session, &attachment, cols, rows).await;
        if result.is_err() {
            attachment.pending.discard();
            return result;
        }

        // Nudge the multiplexer into resending the visible screen; this
        // recovers terminals that were stale when the browser reconnected.
        let tmux = self.tmux.clone();
        let redraw_session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FORCE_REDRAW_DELAY).await;
            let _ = tmux.resize_window(&redraw_session, cols, rows + 1).await;
            let _ = tmux.resize_window(&redraw_session, cols, rows).await;
        });

        Ok(())
    }

    async fn replay_history(
        &self,
        id: &str,
        session: &str,
        attachment: &Attachment,
        cols: u16,
        rows: u16,
    ) -> anyhow::Result<()> {
        // Resize before capturing so the history reflects the requested
        // geometry (resize-race mitigation).
        self.tmux.resize_window(session, cols, rows).await?;
        let _ = attachment.write(BridgeFrame::Resize { cols, rows });

        let history = self.tmux.capture_history(session).await?;
        let data =
            base64::engine::general_purpose::STANDARD.encode(history.replace('\n', "\r\n"));

        // History replay is never dropped; a refused send is an error.
        let sent = self.outbound.send(Message::TerminalHistory(TerminalData {
            terminal_id: id.to_owned(),
            data,
            agent_id: None,
        }));
        if !sent {
            anyhow::bail!("transport refused history frame");
        }

        let _ = self.outbound.send(Message::TerminalAttached(TerminalGeometry {
            terminal_id: id.to_owned(),
            cols,
            rows,
            agent_id: None,
        }));

        // Flush bytes that arrived during the capture, in arrival order.
        attachment.pending.flush(id, &self.outbound);
        Ok(())
    }

    /// The live attachment for a terminal, dialing the bridge if needed.
    async fn ensure_attachment(
        self: &Arc<Self>,
        id: &str,
        session: &str,
    ) -> anyhow::Result<Arc<Attachment>> {
        if let Some(existing) = self.active.lock().await.get(id) {
            return Ok(Arc::clone(existing));
        }

        let ws_url = self.spawner.ensure(session).await?;

        let manager: Weak<TerminalManager> = Arc::downgrade(self);
        let close_id = id.to_owned();
        let attachment = stream::connect(id, &ws_url, self.outbound.clone(), move |epoch| {
            if let Some(manager) = manager.upgrade() {
                tokio::spawn(async move {
                    manager.handle_bridge_close(&close_id, epoch).await;
                });
            }
        })
        .await?;

        let attachment = Arc::new(attachment);
        self.active.lock().await.insert(id.to_owned(), Arc::clone(&attachment));
        Ok(attachment)
    }

    /// A bridge connection ended. Only the connection observed to close may
    /// emit `terminal:closed`; a stale close for a superseded attachment is
    /// ignored.
    async fn handle_bridge_close(&self, id: &str, epoch: u64) {
        let mut active = self.active.lock().await;
        let is_current = active.get(id).map(|a| a.epoch == epoch).unwrap_or(false);
        if !is_current {
            debug!(terminal_id = %id, epoch, "ignoring stale bridge close");
            return;
        }
        active.remove(id);
        drop(active);
        let _ = self.outbound.send(Message::TerminalClosed(TerminalRef {
            terminal_id: id.to_owned(),
            agent_id: None,
        }));
    }

    // -- Live operations ---------------------------------------------------

    /// Forward decoded keystrokes to the bridge. Dropped (and logged) when
    /// no bridge connection is open.
    pub async fn input(&self, id: &str, data_b64: &str) {
        let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data_b64) else {
            debug!(terminal_id = %id, "discarding undecodable input");
            return;
        };
        let active = self.active.lock().await;
        match active.get(id) {
            Some(attachment) => {
                if !attachment.write(BridgeFrame::Input(bytes.into())) {
                    debug!(terminal_id = %id, "bridge gone; input dropped");
                }
            }
            None => debug!(terminal_id = %id, "no attachment; input dropped"),
        }
    }

    pub async fn resize(&self, id: &str, cols: u16, rows: u16) {
        if let Some(attachment) = self.active.lock().await.get(id) {
            let _ = attachment.write(BridgeFrame::Resize { cols, rows });
        }
        if let Some(record) = self.get(id).await {
            let _ = self.tmux.resize_window(&record.session_name, cols, rows).await;
        }
    }

    pub async fn scroll(&self, id: &str, lines: i32) {
        let clamped = lines.clamp(-SCROLL_CLAMP, SCROLL_CLAMP);
        if let Some(record) = self.get(id).await {
            let _ = self.tmux.scroll(&record.session_name, clamped).await;
        }
    }

    /// Close the viewport but keep the session (and possibly the bridge).
    pub async fn detach(&self, id: &str) {
        if let Some(attachment) = self.active.lock().await.get(id) {
            attachment.close();
        }
    }

    /// Kill the session and release its bridge. The record survives so the
    /// pane can be resumed. `terminal:closed` is emitted by the bridge
    /// connection's close handler, which observes the close directly.
    pub async fn close(&self, id: &str) {
        if let Some(attachment) = self.active.lock().await.get(id) {
            attachment.close();
        }
        if let Some(record) = self.get(id).await {
            self.spawner.release(&record.session_name).await;
            let _ = self.tmux.kill_session(&record.session_name).await;
        }
    }

    /// Graceful shutdown: close every bridge connection and process.
    pub async fn shutdown(&self) {
        let attachments: Vec<Arc<Attachment>> =
            self.active.lock().await.drain().map(|(_, a)| a).collect();
        for attachment in attachments {
            attachment.close();
        }
        self.spawner.release_all().await;
    }

    fn send_error(&self, id: &str, message: &str) {
        let _ = self.outbound.send(Message::TerminalError(TerminalErrorMsg {
            terminal_id: id.to_owned(),
            message: message.to_owned(),
        }));
    }
}

/// Expand `~` and enforce the working-directory restriction: only the
/// user's home subtree and /tmp are permitted.
pub fn resolve_working_dir(input: &str) -> anyhow::Result<PathBuf> {
    let home = home_dir()?;
    let path = if input.is_empty() || input == "~" {
        home.clone()
    } else if let Some(rest) = input.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(input)
    };

    if path.starts_with(&home) || path.starts_with("/tmp") {
        Ok(path)
    } else {
        anyhow::bail!("working directory must be under the home directory or /tmp")
    }
}

fn new_terminal_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id.chars().take(8).collect()
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
