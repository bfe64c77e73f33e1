// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Web-tty bridge processes: one external process per attached session,
//! exposing the session as a byte channel on a loopback port.
//!
//! Ports come from the reserved range 7700-7799. Spawns are serialized to
//! avoid lock contention on the tmux server; readiness is detected by a
//! "listening" marker on the bridge's stderr within 5 seconds.

use std::collections::{BTreeSet, HashMap};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// First loopback port reserved for bridges.
pub const PORT_FIRST: u16 = 7700;
/// Last loopback port reserved for bridges.
pub const PORT_LAST: u16 = 7799;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-writer pool over the reserved port range.
#[derive(Debug)]
pub struct PortPool {
    free: BTreeSet<u16>,
}

impl PortPool {
    pub fn new() -> Self {
        Self { free: (PORT_FIRST..=PORT_LAST).collect() }
    }

    /// Claim the lowest free port.
    pub fn claim(&mut self) -> Option<u16> {
        let port = self.free.iter().next().copied()?;
        self.free.remove(&port);
        Some(port)
    }

    /// Return a port after its owning bridge has exited.
    pub fn release(&mut self, port: u16) {
        if (PORT_FIRST..=PORT_LAST).contains(&port) {
            self.free.insert(port);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl Default for PortPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bridge process bound to one session.
#[derive(Debug)]
pub struct Bridge {
    pub session: String,
    pub port: u16,
    child: tokio::process::Child,
}

impl Bridge {
    /// Local WebSocket URL of the bridge's byte channel.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

/// Spawns and tracks bridge processes. At most one bridge per session.
pub struct BridgeSpawner {
    bridge_cmd: String,
    pool: Mutex<PortPool>,
    bridges: Mutex<HashMap<String, Bridge>>,
    /// Serializes spawns; tmux attach storms contend on the server lock.
    spawn_lock: Mutex<()>,
}

impl BridgeSpawner {
    pub fn new(bridge_cmd: impl Into<String>) -> Self {
        Self {
            bridge_cmd: bridge_cmd.into(),
            pool: Mutex::new(PortPool::new()),
            bridges: Mutex::new(HashMap::new()),
            spawn_lock: Mutex::new(()),
        }
    }

    /// Kill any stale process still listening on a reserved port, then
    /// reset the pool. Called once at startup before any spawn.
    pub async fn reclaim_ports(&self) {
        for (port, pid) in stale_port_holders() {
            warn!(port, pid, "killing stale bridge process");
            kill_pid(pid);
        }
        *self.pool.lock().await = PortPool::new();
    }

    /// The bridge URL for a session, spawning the bridge if needed.
    pub async fn ensure(&self, session: &str) -> anyhow::Result<String> {
        {
            let bridges = self.bridges.lock().await;
            if let Some(bridge) = bridges.get(session) {
                return Ok(bridge.ws_url());
            }
        }

        let _guard = self.spawn_lock.lock().await;

        // Re-check under the spawn lock; a concurrent caller may have won.
        {
            let bridges = self.bridges.lock().await;
            if let Some(bridge) = bridges.get(session) {
                return Ok(bridge.ws_url());
            }
        }

        let port = self
            .pool
            .lock()
            .await
            .claim()
            .ok_or_else(|| anyhow::anyhow!("no free bridge ports in {PORT_FIRST}-{PORT_LAST}"))?;

        match self.spawn(session, port).await {
            Ok(bridge) => {
                let url = bridge.ws_url();
                self.bridges.lock().await.insert(session.to_owned(), bridge);
                Ok(url)
            }
            Err(e) => {
                self.pool.lock().await.release(port);
                Err(e)
            }
        }
    }

    async fn spawn(&self, session: &str, port: u16) -> anyhow::Result<Bridge> {
        let mut cmd = tokio::process::Command::new(&self.bridge_cmd);
        cmd.args([
            "--port",
            &port.to_string(),
            "--interface",
            "127.0.0.1",
            "--writable",
            "tmux",
            "attach-session",
            "-t",
            session,
        ]);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            anyhow::anyhow!("failed to spawn bridge '{}': {e}", self.bridge_cmd)
        })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("bridge stderr not captured"))?;

        // The bridge logs a "listening" marker once its socket is bound.
        let ready = async {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(session, port, line = %line, "bridge");
                if line.to_lowercase().contains("listening") {
                    return true;
                }
            }
            false
        };

        match tokio::time::timeout(READY_TIMEOUT, ready).await {
            Ok(true) => {
                info!(session, port, "bridge ready");
                Ok(Bridge { session: session.to_owned(), port, child })
            }
            Ok(false) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                anyhow::bail!("bridge for '{session}' exited before listening")
            }
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                anyhow::bail!("bridge for '{session}' not ready within 5s")
            }
        }
    }

    /// Tear down the bridge for a session and release its port.
    pub async fn release(&self, session: &str) {
        let bridge = self.bridges.lock().await.remove(session);
        if let Some(mut bridge) = bridge {
            let port = bridge.port;
            bridge.kill().await;
            self.pool.lock().await.release(port);
            debug!(session, port, "bridge released");
        }
    }

    /// Tear down every bridge (agent shutdown).
    pub async fn release_all(&self) {
        let sessions: Vec<String> = self.bridges.lock().await.keys().cloned().collect();
        for session in sessions {
            self.release(&session).await;
        }
    }
}

/// Find processes listening on reserved ports. Linux: walk /proc/net/tcp
/// for LISTEN sockets in range, then match socket inodes under /proc/*/fd.
#[cfg(target_os = "linux")]
fn stale_port_holders() -> Vec<(u16, u32)> {
    let Ok(tcp) = std::fs::read_to_string("/proc/net/tcp") else {
        return vec![];
    };

    let mut inodes: HashMap<u64, u16> = HashMap::new();
    for line in tcp.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // local_address is field 1 ("ADDR:PORT" hex), state field 3, inode field 9.
        if fields.len() < 10 || fields[3] != "0A" {
            continue;
        }
        let Some(port_hex) = fields[1].split(':').nth(1) else { continue };
        let Ok(port) = u16::from_str_radix(port_hex, 16) else { continue };
        if !(PORT_FIRST..=PORT_LAST).contains(&port) {
            continue;
        }
        if let Ok(inode) = fields[9].parse::<u64>() {
            inodes.insert(inode, port);
        }
    }
    if inodes.is_empty() {
        return vec![];
    }

    let mut holders = Vec::new();
    let Ok(proc_entries) = std::fs::read_dir("/proc") else {
        return holders;
    };
    for entry in proc_entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else { continue };
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else { continue };
        for fd in fds.flatten() {
            let Ok(target) = std::fs::read_link(fd.path()) else { continue };
            let target = target.to_string_lossy();
            let Some(inode_str) = target
                .strip_prefix("socket:[")
                .and_then(|s| s.strip_suffix(']'))
            else {
                continue;
            };
            if let Ok(inode) = inode_str.parse::<u64>() {
                if let Some(port) = inodes.get(&inode) {
                    holders.push((*port, pid));
                }
            }
        }
    }
    holders
}

#[cfg(not(target_os = "linux"))]
fn stale_port_holders() -> Vec<(u16, u32)> {
    vec![]
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) {}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
