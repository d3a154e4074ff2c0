//! Integration tests for request/response exchanges through `EngineBridge`.

use std::sync::Arc;

use serde_json::{json, Map};

use graph_engine_bridge::engine::{EngineResponse, EngineState, Operation};
use graph_engine_bridge::AppError;

use super::support::{fake_bridge, params};

// ── Basic exchanges ─────────────────────────────────────────────────────────

/// A freshly started engine with no graph reports an empty graph.
#[tokio::test]
async fn graph_info_on_fresh_engine_reports_empty_graph() {
    let bridge = fake_bridge();

    let response = bridge
        .invoke(Operation::GetGraphInfo, Map::new())
        .await
        .expect("exchange succeeds");

    assert!(response.success);
    assert_eq!(response.node_count(), Some(0));
    assert_eq!(response.edge_count(), Some(0));
    assert_eq!(response.directed(), Some(false));

    let status = bridge.status().await;
    assert_eq!(status.state, EngineState::Running);
    assert_eq!(status.spawn_count, 1);
    assert!(status.pid.is_some());
}

/// An engine-reported failure is a normal response; the reason survives
/// verbatim through `into_result`.
#[tokio::test]
async fn engine_reported_failure_carries_reason() {
    let bridge = fake_bridge();

    let response = bridge
        .invoke(
            Operation::LoadGraph,
            params(json!({"filePath": "missing.gexf", "format": "gexf"})),
        )
        .await
        .expect("exchange itself succeeds");
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("File not found: missing.gexf"));

    match response.into_result() {
        Err(AppError::EngineFailure(reason)) => {
            assert_eq!(reason, "File not found: missing.gexf");
        }
        other => panic!("expected EngineFailure, got {other:?}"),
    }
}

/// Requests reach the engine as `{"operation", "params"}` lines.
#[tokio::test]
async fn request_reaches_engine_as_one_line() {
    let bridge = fake_bridge();

    let response = bridge
        .invoke(Operation::SaveGraph, params(json!({"filePath": "out.gexf", "format": "gexf"})))
        .await
        .expect("exchange succeeds");

    assert_eq!(
        response.field("echo"),
        Some(&json!({
            "operation": "save_graph",
            "params": {"filePath": "out.gexf", "format": "gexf"}
        }))
    );
}

/// A response written in pieces is reassembled before decoding.
#[tokio::test]
async fn chunked_response_is_reassembled() {
    let bridge = fake_bridge();

    let response = bridge
        .invoke(Operation::SaveGraph, params(json!({"chunked": true})))
        .await
        .expect("exchange succeeds");

    assert!(response.success);
    assert_eq!(response.node_count(), Some(7));
}

/// A malformed answer fails only its own exchange.
#[tokio::test]
async fn malformed_response_is_protocol_error() {
    let bridge = fake_bridge();

    let err = bridge
        .invoke(Operation::SaveGraph, params(json!({"garbage": true})))
        .await
        .expect_err("garbage must fail");
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");

    let next = bridge
        .invoke(Operation::GetGraphInfo, Map::new())
        .await
        .expect("engine still usable");
    assert_eq!(next.node_count(), Some(0));
    assert_eq!(bridge.status().await.spawn_count, 1);
}

// ── Single-flight ───────────────────────────────────────────────────────────

/// Concurrent callers each receive the response to their own request.
#[tokio::test]
async fn concurrent_calls_are_serialized_and_correlated() {
    let bridge = Arc::new(fake_bridge());

    let tasks: Vec<_> = (0..12)
        .map(|n| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                let response = bridge
                    .invoke(Operation::SaveGraph, params(json!({"n": n})))
                    .await
                    .expect("exchange succeeds");
                (n, response)
            })
        })
        .collect();

    for task in tasks {
        let (n, response): (i32, EngineResponse) = task.await.expect("task");
        let echoed = response
            .field("echo")
            .and_then(|echo| echo["params"]["n"].as_i64())
            .expect("echoed request");
        assert_eq!(echoed, i64::from(n), "response belongs to another caller");
    }

    let status = bridge.status().await;
    assert_eq!(status.spawn_count, 1, "one engine serves every caller");
    assert_eq!(status.exchanges, 12);
    assert_eq!(status.owed_responses, 0);
}
