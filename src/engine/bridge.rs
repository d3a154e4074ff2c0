//! Request/response bridge to the engine.
//!
//! [`EngineBridge::invoke`] is the only path that touches the engine's
//! streams. Callers queue on a FIFO-fair [`Mutex`]; the holder runs exactly
//! one exchange (write one line, read one line) before releasing it, so two
//! requests never interleave on stdin and responses are never matched to
//! the wrong caller.
//!
//! # Stale responses
//!
//! The engine answers strictly in order. When an exchange times out, or its
//! caller is dropped before the response is read, the process is marked as
//! owing one response. The next caller first runs a liveness probe that
//! discards exactly that many lines before accepting the probe's own answer.
//! If the probe fails the engine is restarted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::codec::{decode_response, encode_request};
use super::message::{EngineRequest, EngineResponse, Operation};
use super::process::{EngineProcessHandle, EngineState};
use super::spawner::{ExitInfo, SpawnConfig};
use crate::config::EngineConfig;
use crate::{AppError, Result};

/// The single in-flight exchange.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Monotonic exchange id, for logs.
    pub id: u64,
    /// Operation that was sent.
    pub operation: Operation,
    /// Instant after which the exchange resolves as a timeout.
    pub deadline: Instant,
    /// Whether the response line has been read.
    pub consumed: bool,
}

/// Point-in-time view of the engine supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Lifecycle state.
    pub state: EngineState,
    /// OS process id of the attached engine.
    pub pid: Option<u32>,
    /// When the attached engine was spawned.
    pub started_at: Option<DateTime<Utc>>,
    /// Processes spawned since the bridge was created.
    pub spawn_count: u64,
    /// Exchanges started since the bridge was created.
    pub exchanges: u64,
    /// Responses owed to timed-out or abandoned exchanges.
    pub owed_responses: usize,
    /// Most recent engine exit.
    pub last_exit: Option<ExitInfo>,
}

#[derive(Debug)]
struct Link {
    engine: EngineProcessHandle,
    pending: Option<PendingExchange>,
}

impl Link {
    /// Clear the pending slot; an unread response becomes owed.
    fn retire_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.consumed {
            return;
        }

        debug!(
            id = pending.id,
            operation = %pending.operation,
            "retiring exchange without a response"
        );
        if let Some(process) = self.engine.process_mut() {
            process.owe_response();
        }
    }

    async fn exchange(
        &mut self,
        operation: Operation,
        line: &[u8],
        window: Duration,
    ) -> Result<EngineResponse> {
        let Some(process) = self.engine.process_mut() else {
            return Err(AppError::ProcessExited("engine is not running".into()));
        };
        let pending = &mut self.pending;

        let deadline = pending
            .as_ref()
            .map_or_else(|| Instant::now() + window, |p| p.deadline);

        let round_trip = async {
            process.write_line(line).await?;
            let response = process.recv_line().await?;
            if let Some(p) = pending.as_mut() {
                p.consumed = true;
            }
            decode_response(&response)
        };

        match tokio::time::timeout_at(deadline, round_trip).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::Timeout(format!(
                "engine did not answer {operation} within {window:?}"
            ))),
        }
    }
}

/// Single-flight bridge to the engine process.
#[derive(Debug)]
pub struct EngineBridge {
    link: Mutex<Link>,
    request_timeout: Duration,
    health_check_timeout: Duration,
    shutdown: CancellationToken,
    exchanges: AtomicU64,
}

impl EngineBridge {
    /// Create a bridge; no process is spawned until the first call.
    #[must_use]
    pub fn new(spawn: SpawnConfig, request_timeout: Duration, health_check_timeout: Duration) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            link: Mutex::new(Link {
                engine: EngineProcessHandle::new(spawn, shutdown.clone()),
                pending: None,
            }),
            request_timeout,
            health_check_timeout,
            shutdown,
            exchanges: AtomicU64::new(0),
        }
    }

    /// Create a bridge from the engine section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the engine command cannot be resolved.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(
            config.spawn_config()?,
            config.request_timeout(),
            config.health_check_timeout(),
        ))
    }

    /// Run one exchange with the engine.
    ///
    /// Waits behind any in-flight exchange, verifies the engine if the
    /// previous exchange left it in an unknown state, starts it if needed,
    /// then writes the request and waits for its response.
    ///
    /// The returned response may carry `success: false`; use
    /// [`EngineResponse::into_result`] to turn that into an error.
    ///
    /// # Errors
    ///
    /// - `AppError::Spawn`: the engine could not be started.
    /// - `AppError::Timeout`: no response within the request window.
    /// - `AppError::Protocol`: the response line was malformed.
    /// - `AppError::ProcessExited`: the engine died mid-exchange, or the
    ///   bridge is shut down.
    pub async fn invoke(
        &self,
        operation: Operation,
        params: Map<String, Value>,
    ) -> Result<EngineResponse> {
        let line = encode_request(&EngineRequest::new(operation, params))?;
        let id = self.exchanges.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("exchange", id, operation = %operation);

        async {
            let mut link = self.link.lock().await;
            self.prepare(&mut link).await?;

            link.pending = Some(PendingExchange {
                id,
                operation,
                deadline: Instant::now() + self.request_timeout,
                consumed: false,
            });

            let outcome = link.exchange(operation, &line, self.request_timeout).await;
            link.retire_pending();

            match outcome {
                Ok(ref response) => debug!(success = response.success, "exchange complete"),
                Err(ref err @ AppError::ProcessExited(_)) => {
                    warn!(%err, "engine exited during exchange");
                    link.engine.reap_if_exited();
                }
                Err(ref err) => warn!(%err, "exchange failed"),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    /// Snapshot of the supervisor. Waits behind any in-flight exchange.
    pub async fn status(&self) -> EngineStatus {
        let mut link = self.link.lock().await;
        link.engine.reap_if_exited();
        let process = link.engine.process();

        EngineStatus {
            state: link.engine.state(),
            pid: process.and_then(|p| p.pid()),
            started_at: process.map(|p| p.started_at()),
            spawn_count: link.engine.spawn_count(),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            owed_responses: process.map_or(0, |p| p.owed()),
            last_exit: link.engine.last_exit().cloned(),
        }
    }

    /// Refuse further calls and terminate the engine.
    ///
    /// An exchange in flight resolves as `ProcessExited` once the process
    /// is gone.
    pub async fn shutdown(&self) {
        info!("engine bridge shutting down");
        self.shutdown.cancel();
        let mut link = self.link.lock().await;
        link.engine.stop().await;
    }

    /// Whether [`Self::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn prepare(&self, link: &mut Link) -> Result<()> {
        if self.is_shut_down() {
            return Err(AppError::ProcessExited("engine bridge is shut down".into()));
        }

        if link.pending.is_some() {
            warn!("previous caller abandoned its exchange");
            link.retire_pending();
        }

        link.engine.reap_if_exited();

        if let Some(process) = link.engine.process_mut() {
            if process.needs_health_check() {
                let owed = process.owed();
                match process.probe(self.health_check_timeout).await {
                    Ok(_) => info!(discarded = owed, "engine passed liveness check"),
                    Err(err) => {
                        warn!(%err, "engine failed liveness check, restarting");
                        link.engine.stop().await;
                    }
                }
            }
        }

        link.engine.ensure_started().await?;
        Ok(())
    }
}
