//! Integration tests for the engine process state machine.

use tokio_util::sync::CancellationToken;

use graph_engine_bridge::engine::{EngineProcessHandle, EngineState};
use graph_engine_bridge::AppError;

use super::support::{engine_config, FAKE_ENGINE};

fn handle(script: &str, shutdown: CancellationToken) -> EngineProcessHandle {
    let spawn = engine_config(script).spawn_config().expect("spawn config");
    EngineProcessHandle::new(spawn, shutdown)
}

/// Repeated `ensure_started` calls while the engine lives spawn nothing new.
#[tokio::test]
async fn ensure_started_is_idempotent() {
    let mut engine = handle(FAKE_ENGINE, CancellationToken::new());
    assert_eq!(engine.state(), EngineState::Stopped);

    assert!(engine.ensure_started().await.expect("first start spawns"));
    let pid = engine.process().and_then(|p| p.pid());

    for _ in 0..3 {
        assert!(!engine.ensure_started().await.expect("already running"));
    }

    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(engine.spawn_count(), 1);
    assert_eq!(engine.process().and_then(|p| p.pid()), pid);

    engine.stop().await;
}

#[tokio::test]
async fn stop_returns_to_stopped_and_records_exit() {
    let mut engine = handle(FAKE_ENGINE, CancellationToken::new());
    engine.ensure_started().await.expect("start");

    engine.stop().await;

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.process().is_none());
    assert!(engine.last_exit().is_some());
    assert!(!engine.reap_if_exited(), "nothing left to reap");
}

/// An exit is only observed; the next `ensure_started` respawns.
#[tokio::test]
async fn exited_engine_is_reaped_and_respawned() {
    let mut engine = handle("read -r line; exit 5", CancellationToken::new());
    // The readiness ping is the line that ends this engine.
    let err = engine.ensure_started().await.expect_err("engine exits on ping");
    assert!(matches!(err, AppError::Spawn(_)), "got {err:?}");
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.last_exit().and_then(|exit| exit.code), Some(5));
    assert_eq!(engine.spawn_count(), 1);

    let again = engine.ensure_started().await;
    assert!(again.is_err());
    assert_eq!(engine.spawn_count(), 2, "each attempt spawns a fresh process");
}

#[tokio::test]
async fn cancelled_supervisor_refuses_to_spawn() {
    let shutdown = CancellationToken::new();
    let mut engine = handle(FAKE_ENGINE, shutdown.clone());
    shutdown.cancel();

    match engine.ensure_started().await {
        Err(AppError::Spawn(msg)) => assert!(msg.contains("shutting down"), "{msg}"),
        other => panic!("expected Spawn error, got {other:?}"),
    }
    assert_eq!(engine.spawn_count(), 0);
}

/// Cancelling the supervisor token terminates a running engine.
#[tokio::test]
async fn cancelling_supervisor_terminates_engine() {
    let shutdown = CancellationToken::new();
    let mut engine = handle(FAKE_ENGINE, shutdown.clone());
    engine.ensure_started().await.expect("start");

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !engine.reap_if_exited() {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("engine exits after cancellation");

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.last_exit().is_some());
}

/// A start attempt abandoned during the readiness check leaves the handle
/// `Stopped`, not stuck in `Starting`.
#[tokio::test]
async fn abandoned_start_falls_back_to_stopped() {
    // Reads requests forever and never answers the readiness ping.
    let mut engine = handle(
        "while IFS= read -r line; do :; done",
        CancellationToken::new(),
    );

    let abandoned =
        tokio::time::timeout(std::time::Duration::from_millis(200), engine.ensure_started()).await;
    assert!(abandoned.is_err(), "readiness never completes");

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.process().is_none());
    assert_eq!(engine.spawn_count(), 1);
}
