//! Unit tests for the engine line codec and request/response records.
//!
//! Covers:
//! - partial delivery is buffered until the line terminator arrives
//! - several lines delivered in one read are yielded one at a time
//! - overlong lines fail with `AppError::Protocol("line too long")`
//! - the request wire shape and response decoding

use bytes::BytesMut;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, FramedRead};

use graph_engine_bridge::engine::codec::{
    decode_response, encode_request, EngineCodec, MAX_LINE_BYTES,
};
use graph_engine_bridge::engine::{EngineRequest, Operation};
use graph_engine_bridge::AppError;

// ── Framing ─────────────────────────────────────────────────────────────────

/// A response split across reads is emitted only once the `\n` arrives.
#[test]
fn partial_delivery_is_buffered_until_newline() {
    let mut codec = EngineCodec::new();

    let mut buf = BytesMut::from("{\"success\":tr");
    assert_eq!(codec.decode(&mut buf).expect("partial decode"), None);

    buf.extend_from_slice(b"ue,\"nodeCount\":3}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("complete decode"),
        Some("{\"success\":true,\"nodeCount\":3}".to_owned())
    );
}

#[test]
fn batched_lines_are_yielded_one_at_a_time() {
    let mut codec = EngineCodec::new();
    let mut buf = BytesMut::from("{\"success\":true}\n{\"success\":false}\n");

    assert_eq!(
        codec.decode(&mut buf).expect("first"),
        Some("{\"success\":true}".to_owned())
    );
    assert_eq!(
        codec.decode(&mut buf).expect("second"),
        Some("{\"success\":false}".to_owned())
    );
    assert_eq!(codec.decode(&mut buf).expect("drained"), None);
}

#[test]
fn overlong_line_is_a_protocol_error() {
    let mut codec = EngineCodec::new();
    let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_BYTES + 1].as_slice());

    match codec.decode(&mut buf) {
        Err(AppError::Protocol(msg)) => assert!(msg.starts_with("line too long"), "{msg}"),
        other => panic!("expected Protocol error, got {other:?}"),
    }
}

/// Invalid UTF-8 is undecodable response text, not an I/O failure.
#[test]
fn invalid_utf8_is_a_protocol_error() {
    let mut codec = EngineCodec::new();
    let mut buf = BytesMut::from(&b"\xff\xfe\n"[..]);

    match codec.decode(&mut buf) {
        Err(AppError::Protocol(msg)) => assert!(msg.starts_with("undecodable response"), "{msg}"),
        other => panic!("expected Protocol error, got {other:?}"),
    }
}

/// A tail without its terminator is not a record; at end of stream it is
/// dropped and only complete lines are yielded.
#[test]
fn unterminated_tail_at_eof_is_dropped() {
    let mut codec = EngineCodec::new();
    let mut buf = BytesMut::from("{\"success\":true}\n{\"success\":true,\"nodeCount\":5}");

    assert_eq!(
        codec.decode_eof(&mut buf).expect("complete line"),
        Some("{\"success\":true}".to_owned())
    );
    assert_eq!(codec.decode_eof(&mut buf).expect("tail dropped"), None);
    assert!(buf.is_empty());
}

/// Bytes trickling through a pipe reassemble into whole lines.
#[tokio::test]
async fn framed_reader_reassembles_chunked_stream() {
    let (mut tx, rx) = tokio::io::duplex(64);
    let mut lines = FramedRead::new(rx, EngineCodec::new());

    let writer = tokio::spawn(async move {
        for chunk in ["{\"succ", "ess\":true,\"edge", "Count\":9}\n{\"success\"", ":true}\n"] {
            tx.write_all(chunk.as_bytes()).await.expect("write chunk");
            tokio::task::yield_now().await;
        }
    });

    let first = lines.next().await.expect("first line").expect("decode");
    let second = lines.next().await.expect("second line").expect("decode");
    writer.await.expect("writer task");

    assert_eq!(decode_response(&first).expect("json").edge_count(), Some(9));
    assert!(decode_response(&second).expect("json").success);
    assert!(lines.next().await.is_none(), "stream ends after writer drops");
}

#[tokio::test]
async fn framed_reader_ends_on_truncated_record() {
    let (mut tx, rx) = tokio::io::duplex(64);
    let mut lines = FramedRead::new(rx, EngineCodec::new());

    tx.write_all(b"{\"success\":tr").await.expect("write fragment");
    drop(tx);

    assert!(lines.next().await.is_none(), "fragment is not a line");
}

// ── Records ─────────────────────────────────────────────────────────────────

#[test]
fn request_wire_shape_is_operation_and_params() {
    let mut params = Map::new();
    params.insert("filePath".into(), json!("out.graphml"));
    params.insert("format".into(), json!("graphml"));

    let bytes = encode_request(&EngineRequest::new(Operation::SaveGraph, params)).expect("encode");
    let value: Value = serde_json::from_slice(&bytes).expect("valid json");

    assert_eq!(
        value,
        json!({
            "operation": "save_graph",
            "params": {"filePath": "out.graphml", "format": "graphml"}
        })
    );
}

#[test]
fn ping_request_has_empty_params() {
    let bytes = encode_request(&EngineRequest::ping()).expect("encode");
    assert_eq!(bytes, b"{\"operation\":\"ping\",\"params\":{}}\n");
}

/// Unknown response fields pass through untouched.
#[test]
fn response_keeps_unknown_fields() {
    let response =
        decode_response("{\"success\":true,\"layoutTimeMs\":12,\"status\":\"ok\"}").expect("decode");
    assert_eq!(response.field("layoutTimeMs"), Some(&json!(12)));
    assert_eq!(response.status(), Some("ok"));
}

#[test]
fn non_json_response_is_malformed() {
    match decode_response("Exception in thread \"main\"") {
        Err(AppError::Protocol(msg)) => assert!(msg.starts_with("malformed response"), "{msg}"),
        other => panic!("expected Protocol error, got {other:?}"),
    }
}
