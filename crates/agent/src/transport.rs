// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound transport to the relay: one long-lived authenticated WebSocket
//! carrying `{type, payload, id?}` frames.
//!
//! The send path is non-blocking and best-effort: when the transport is not
//! open, `Outbound::send` drops the frame and returns `false` — higher
//! layers decide whether anything needs to be regenerated. There is no
//! retry queue; real-time state is rebuildable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fortynine_proto::messages::{AgentAuth, AgentPong, Message};
use fortynine_proto::Envelope;

use crate::config::AgentConfig;

/// Initial reconnect delay.
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
/// Reconnect delay cap.
const BACKOFF_MAX: Duration = Duration::from_secs(30);
/// Force a reconnect when no `agent:ping` arrived within this window.
const PING_DEADLINE: Duration = Duration::from_secs(45);

/// Non-blocking sender half of the relay link.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Envelope>,
    connected: Arc<AtomicBool>,
}

impl Outbound {
    /// Send a streaming message. Returns `false` if the transport is not
    /// open (the frame is dropped).
    pub fn send(&self, message: Message) -> bool {
        self.send_envelope(Envelope::new(message))
    }

    /// Send a correlated message (response or scan partial).
    pub fn send_with_id(&self, message: Message, id: &str) -> bool {
        self.send_envelope(Envelope::with_id(message, id))
    }

    fn send_envelope(&self, env: Envelope) -> bool {
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(env).is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Test hook: mark the transport open without a relay.
    #[cfg(test)]
    pub(crate) fn test_connect(&self) {
        self.connected.store(true, Ordering::Release);
    }
}

/// Build the outbound handle and its consuming receiver.
pub fn outbound_channel() -> (Outbound, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbound { tx, connected: Arc::new(AtomicBool::new(false)) }, rx)
}

/// Exponential reconnect backoff: 1 s doubling to a 30 s cap, reset on
/// successful authentication.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self { delay: BACKOFF_INITIAL }
    }

    /// The delay to sleep before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
        delay
    }

    pub fn reset(&mut self) {
        self.delay = BACKOFF_INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the connection loop stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkExit {
    /// Shutdown was requested; the transport closed intentionally.
    Shutdown,
    /// The relay rejected our token; reconnecting is pointless.
    AuthFailed(String),
}

/// Run the relay link until shutdown or a fatal auth failure.
///
/// Inbound frames (other than keep-alive, which is answered here) are
/// handed to `inbound_tx`; outbound frames are drained from the channel
/// behind the [`Outbound`] handle.
pub async fn run(
    config: AgentConfig,
    outbound: Outbound,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    shutdown: CancellationToken,
) -> LinkExit {
    let url = config.agent_ws_url();
    let mut backoff = Backoff::new();

    loop {
        if shutdown.is_cancelled() {
            return LinkExit::Shutdown;
        }

        match connect_once(&config, &url, &outbound, &mut outbound_rx, &inbound_tx, &shutdown)
            .await
        {
            SessionEnd::AuthFailed(reason) => {
                error!(reason = %reason, "relay rejected authentication; not reconnecting");
                return LinkExit::AuthFailed(reason);
            }
            SessionEnd::Shutdown => return LinkExit::Shutdown,
            SessionEnd::Dropped { authenticated } => {
                if authenticated {
                    backoff.reset();
                }
            }
        }

        let delay = backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "reconnecting to relay");
        tokio::select! {
            _ = shutdown.cancelled() => return LinkExit::Shutdown,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

enum SessionEnd {
    AuthFailed(String),
    Shutdown,
    Dropped { authenticated: bool },
}

async fn connect_once(
    config: &AgentConfig,
    url: &str,
    outbound: &Outbound,
    outbound_rx: &mut mpsc::UnboundedReceiver<Envelope>,
    inbound_tx: &mpsc::UnboundedSender<Envelope>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let stream = match tokio_tungstenite::connect_async(url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            debug!(err = %e, url, "relay connect failed");
            return SessionEnd::Dropped { authenticated: false };
        }
    };

    let (mut ws_tx, mut ws_rx) = stream.split();

    // First frame: authenticate.
    let auth = Envelope::new(Message::AgentAuth(AgentAuth {
        token: config.token.clone(),
        hostname: config.hostname.clone(),
        os: config.os.clone(),
        version: config.version.clone(),
    }));
    let Ok(text) = auth.to_text() else {
        return SessionEnd::Dropped { authenticated: false };
    };
    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
        return SessionEnd::Dropped { authenticated: false };
    }

    let mut authenticated = false;
    let mut last_ping = tokio::time::Instant::now();
    let mut watchdog = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                outbound.connected.store(false, Ordering::Release);
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                return SessionEnd::Shutdown;
            }

            _ = watchdog.tick() => {
                // Covers both a silent relay mid-session and an auth
                // handshake that never completes.
                if last_ping.elapsed() > PING_DEADLINE {
                    warn!("no ping from relay in 45s; forcing reconnect");
                    outbound.connected.store(false, Ordering::Release);
                    return SessionEnd::Dropped { authenticated };
                }
            }

            env = outbound_rx.recv() => {
                let Some(env) = env else {
                    outbound.connected.store(false, Ordering::Release);
                    return SessionEnd::Shutdown;
                };
                let Ok(text) = env.to_text() else { continue };
                if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                    outbound.connected.store(false, Ordering::Release);
                    return SessionEnd::Dropped { authenticated };
                }
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        debug!(err = %e, "relay transport error");
                        outbound.connected.store(false, Ordering::Release);
                        return SessionEnd::Dropped { authenticated };
                    }
                    None => {
                        outbound.connected.store(false, Ordering::Release);
                        return SessionEnd::Dropped { authenticated };
                    }
                };

                let text = match msg {
                    WsMessage::Text(text) => text.to_string(),
                    WsMessage::Close(_) => {
                        outbound.connected.store(false, Ordering::Release);
                        return SessionEnd::Dropped { authenticated };
                    }
                    _ => continue,
                };

                let env = match Envelope::from_text(&text) {
                    Ok(env) => env,
                    Err(e) => {
                        debug!(err = %e, "unparseable frame from relay");
                        continue;
                    }
                };

                match &env.message {
                    Message::AgentAuthOk(ok) => {
                        info!(agent_id = %ok.agent_id, "authenticated with relay");
                        authenticated = true;
                        last_ping = tokio::time::Instant::now();
                        outbound.connected.store(true, Ordering::Release);
                    }
                    Message::AgentAuthFail(fail) => {
                        outbound.connected.store(false, Ordering::Release);
                        return SessionEnd::AuthFailed(fail.reason.clone());
                    }
                    Message::AgentPing(_) => {
                        last_ping = tokio::time::Instant::now();
                        let pong = Envelope::new(Message::AgentPong(AgentPong { ts: epoch_ms() }));
                        if let Ok(text) = pong.to_text() {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                outbound.connected.store(false, Ordering::Release);
                                return SessionEnd::Dropped { authenticated };
                            }
                        }
                    }
                    _ => {
                        if inbound_tx.send(env).is_err() {
                            outbound.connected.store(false, Ordering::Release);
                            return SessionEnd::Shutdown;
                        }
                    }
                }
            }
        }
    }
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
