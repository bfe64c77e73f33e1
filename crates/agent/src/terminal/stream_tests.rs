// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::Engine;
use bytes::Bytes;

use fortynine_proto::messages::Message;

use super::{decode_output, encode_frame, BridgeFrame, PendingOutput};
use crate::transport::outbound_channel;

fn decode_b64(data: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD.decode(data).unwrap_or_default()
}

#[test]
fn input_frame_prepends_record_type() {
    let encoded = encode_frame(&BridgeFrame::Input(Bytes::from_static(b"ls -la\r")));
    assert_eq!(encoded[0], 0x30);
    assert_eq!(&encoded[1..], b"ls -la\r");
}

#[test]
fn resize_frame_carries_columns_and_rows_json() -> anyhow::Result<()> {
    let encoded = encode_frame(&BridgeFrame::Resize { cols: 120, rows: 40 });
    assert_eq!(encoded[0], 0x31);
    let body: serde_json::Value = serde_json::from_slice(&encoded[1..])?;
    assert_eq!(body["columns"], 120);
    assert_eq!(body["rows"], 40);
    Ok(())
}

#[test]
fn only_output_records_decode() {
    assert_eq!(decode_output(b"0hello"), Some(b"hello".as_slice()));
    assert_eq!(decode_output(b"1{}"), None);
    assert_eq!(decode_output(b""), None);
}

#[tokio::test]
async fn bytes_during_capture_are_buffered_then_flushed_in_order() -> anyhow::Result<()> {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    let pending = PendingOutput::default();

    pending.begin();
    assert!(pending.deliver("t1", Bytes::from_static(b"D"), &outbound));
    assert!(pending.deliver("t1", Bytes::from_static(b"E"), &outbound));
    // Nothing live yet: the capture is still in flight.
    assert!(rx.try_recv().is_err());

    pending.flush("t1", &outbound);
    let first = rx.try_recv()?;
    let second = rx.try_recv()?;
    match (first.message, second.message) {
        (Message::TerminalOutput(a), Message::TerminalOutput(b)) => {
            assert_eq!(decode_b64(&a.data), b"D");
            assert_eq!(decode_b64(&b.data), b"E");
        }
        _ => anyhow::bail!("expected two terminal:output frames"),
    }
    Ok(())
}

#[tokio::test]
async fn bytes_outside_capture_go_live() -> anyhow::Result<()> {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    let pending = PendingOutput::default();

    assert!(!pending.deliver("t1", Bytes::from_static(b"live"), &outbound));
    let env = rx.try_recv()?;
    match env.message {
        Message::TerminalOutput(out) => assert_eq!(decode_b64(&out.data), b"live"),
        _ => anyhow::bail!("expected terminal:output"),
    }
    Ok(())
}

#[tokio::test]
async fn discard_drops_buffered_bytes() {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    let pending = PendingOutput::default();

    pending.begin();
    pending.deliver("t1", Bytes::from_static(b"lost"), &outbound);
    pending.discard();
    assert!(!pending.is_buffering());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn begin_keeps_bytes_already_buffered() -> anyhow::Result<()> {
    let (outbound, mut rx) = outbound_channel();
    outbound.test_connect();
    let pending = PendingOutput::default();

    // The connection starts buffering before the attach sequence calls
    // begin() again; nothing may be lost in between.
    pending.begin();
    pending.deliver("t1", Bytes::from_static(b"early"), &outbound);
    pending.begin();
    pending.flush("t1", &outbound);

    let env = rx.try_recv()?;
    match env.message {
        Message::TerminalOutput(out) => assert_eq!(decode_b64(&out.data), b"early"),
        _ => anyhow::bail!("expected terminal:output"),
    }
    Ok(())
}
