// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-terminal attachment plumbing: the local bridge connection, its
//! framing, and the pending-output buffer that orders live bytes after a
//! history replay.
//!
//! Framing on the bridge channel: one-byte record type, rest = payload.
//! Agent -> bridge: `0x30` raw input bytes, `0x31` resize JSON. Bridge ->
//! agent: `'0'` output bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fortynine_proto::messages::{Message, TerminalData};

use crate::transport::Outbound;

/// Record type for agent -> bridge input bytes.
pub const RECORD_INPUT: u8 = 0x30;
/// Record type for agent -> bridge resize JSON.
pub const RECORD_RESIZE: u8 = 0x31;
/// Record type for bridge -> agent output bytes.
pub const RECORD_OUTPUT: u8 = b'0';

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_GAP: Duration = Duration::from_millis(200);

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Frames written to the bridge.
#[derive(Debug)]
pub enum BridgeFrame {
    Input(Bytes),
    Resize { cols: u16, rows: u16 },
}

#[derive(Serialize)]
struct ResizeBody {
    columns: u16,
    rows: u16,
}

/// Encode a frame for the bridge channel.
pub fn encode_frame(frame: &BridgeFrame) -> Vec<u8> {
    match frame {
        BridgeFrame::Input(bytes) => {
            let mut buf = Vec::with_capacity(bytes.len() + 1);
            buf.push(RECORD_INPUT);
            buf.extend_from_slice(bytes);
            buf
        }
        BridgeFrame::Resize { cols, rows } => {
            let body = serde_json::to_vec(&ResizeBody { columns: *cols, rows: *rows })
                .unwrap_or_default();
            let mut buf = Vec::with_capacity(body.len() + 1);
            buf.push(RECORD_RESIZE);
            buf.extend_from_slice(&body);
            buf
        }
    }
}

/// Output bytes of a bridge frame, if it is an output record.
pub fn decode_output(data: &[u8]) -> Option<&[u8]> {
    match data.split_first() {
        Some((&RECORD_OUTPUT, rest)) => Some(rest),
        _ => None,
    }
}

/// The pending-output buffer. Active only while a history capture is in
/// flight; bytes arriving then are held and flushed after the history
/// frame so the browser never sees live output before its scrollback.
#[derive(Debug, Default)]
pub struct PendingOutput {
    chunks: Mutex<Option<Vec<Bytes>>>,
}

impl PendingOutput {
    /// Start buffering. Idempotent: chunks already held (from a capture
    /// still in flight) are kept, never dropped.
    pub fn begin(&self) {
        if let Ok(mut guard) = self.chunks.lock() {
            if guard.is_none() {
                *guard = Some(Vec::new());
            }
        }
    }

    /// Deliver a chunk: buffered while capture is active, live otherwise.
    /// Returns `true` if the chunk was buffered.
    pub fn deliver(&self, terminal_id: &str, chunk: Bytes, outbound: &Outbound) -> bool {
        if let Ok(mut guard) = self.chunks.lock() {
            if let Some(ref mut chunks) = *guard {
                chunks.push(chunk);
                return true;
            }
        }
        send_output(outbound, terminal_id, &chunk);
        false
    }

    /// Flush buffered chunks in arrival order and return to live delivery.
    /// Holding the lock across the flush keeps concurrently arriving bytes
    /// ordered after the buffered ones.
    pub fn flush(&self, terminal_id: &str, outbound: &Outbound) {
        if let Ok(mut guard) = self.chunks.lock() {
            if let Some(chunks) = guard.take() {
                for chunk in &chunks {
                    send_output(outbound, terminal_id, chunk);
                }
            }
        }
    }

    /// Abandon buffering without emitting (failed attach).
    pub fn discard(&self) {
        if let Ok(mut guard) = self.chunks.lock() {
            *guard = None;
        }
    }

    pub fn is_buffering(&self) -> bool {
        self.chunks.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

fn send_output(outbound: &Outbound, terminal_id: &str, chunk: &[u8]) {
    // Live frames are droppable; forceRedraw regenerates the screen.
    let _ = outbound.send(Message::TerminalOutput(TerminalData {
        terminal_id: terminal_id.to_owned(),
        data: base64::engine::general_purpose::STANDARD.encode(chunk),
        agent_id: None,
    }));
}

/// One live bridge connection for a terminal.
pub struct Attachment {
    pub terminal_id: String,
    /// Identity token; a close event is only authoritative if its epoch
    /// matches the registered attachment's.
    pub epoch: u64,
    pub pending: std::sync::Arc<PendingOutput>,
    frame_tx: mpsc::UnboundedSender<BridgeFrame>,
    cancel: CancellationToken,
}

impl Attachment {
    /// Write an input or resize frame to the bridge. Returns `false` when
    /// the bridge connection is gone (callers drop and log).
    pub fn write(&self, frame: BridgeFrame) -> bool {
        self.frame_tx.send(frame).is_ok()
    }

    /// Close the local bridge connection (the session survives).
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Dial the bridge with bounded retries and run its reader/writer tasks.
///
/// `on_close` fires exactly once when the connection ends, carrying the
/// attachment's epoch so the registry can ignore stale closes.
pub async fn connect(
    terminal_id: &str,
    ws_url: &str,
    outbound: Outbound,
    on_close: impl FnOnce(u64) + Send + 'static,
) -> anyhow::Result<Attachment> {
    let mut last_err = None;
    let mut stream = None;
    for attempt in 0..CONNECT_ATTEMPTS {
        match tokio_tungstenite::connect_async(ws_url).await {
            Ok((s, _)) => {
                stream = Some(s);
                break;
            }
            Err(e) => {
                debug!(terminal_id, attempt, err = %e, "bridge connect attempt failed");
                last_err = Some(e);
                tokio::time::sleep(CONNECT_GAP).await;
            }
        }
    }
    let stream = match stream {
        Some(s) => s,
        None => anyhow::bail!(
            "bridge connect failed after {CONNECT_ATTEMPTS} attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        ),
    };

    let (mut ws_tx, mut ws_rx) = stream.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<BridgeFrame>();
    let cancel = CancellationToken::new();
    let epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
    // Buffer from the very first byte: output arriving before the attach
    // sequence sends its history must not overtake that history.
    let pending = std::sync::Arc::new(PendingOutput::default());
    pending.begin();

    let attachment = Attachment {
        terminal_id: terminal_id.to_owned(),
        epoch,
        pending: std::sync::Arc::clone(&pending),
        frame_tx,
        cancel: cancel.clone(),
    };

    // Writer: frames -> bridge.
    let writer_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
                frame = frame_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let encoded = encode_frame(&frame);
                    if ws_tx.send(WsMessage::Binary(encoded.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: bridge output -> pending buffer or live stream.
    let reader_id = terminal_id.to_owned();
    let reader_cancel = cancel;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = reader_cancel.cancelled() => break,
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(WsMessage::Binary(data))) => {
                            if data.first() == Some(&RECORD_OUTPUT) {
                                pending.deliver(&reader_id, data.slice(1..), &outbound);
                            }
                        }
                        Some(Ok(WsMessage::Text(text))) => {
                            let data = Bytes::from(text);
                            if data.first() == Some(&RECORD_OUTPUT) {
                                pending.deliver(&reader_id, data.slice(1..), &outbound);
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Err(e)) => {
                            debug!(terminal_id = %reader_id, err = %e, "bridge read error");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
        on_close(epoch);
    });

    Ok(attachment)
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
