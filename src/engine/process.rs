//! Engine process lifecycle.
//!
//! [`EngineProcessHandle`] owns at most one [`EngineProcess`] and moves
//! through an explicit state machine:
//!
//! ```text
//!  Stopped ──ensure_started──▶ Starting ──ready──▶ Running
//!     ▲                           │                  │
//!     └──── spawn failure ────────┘                  │
//!     └──── exit observed / stop() ──────────────────┘
//! ```
//!
//! Exits are only observed, never acted upon: respawn happens lazily on
//! the next [`EngineProcessHandle::ensure_started`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::{decode_response, encode_request, EngineCodec};
use super::message::{EngineRequest, EngineResponse};
use super::spawner::{spawn_engine, EngineConnection, ExitInfo, SpawnConfig, TERMINATE_GRACE};
use crate::config::Readiness;
use crate::{AppError, Result};

/// Time allowed for the exit monitor to publish after stdout closes.
const EXIT_SETTLE: Duration = Duration::from_millis(100);

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No process exists.
    Stopped,
    /// A process was spawned and is being checked for readiness.
    Starting,
    /// A ready process is attached.
    Running,
}

/// A live engine process and its protocol streams.
#[derive(Debug)]
pub struct EngineProcess {
    pid: Option<u32>,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, EngineCodec>,
    exit: watch::Receiver<Option<ExitInfo>>,
    terminate: CancellationToken,
    monitor: JoinHandle<()>,
    started_at: DateTime<Utc>,
    /// Responses the engine still owes to requests nobody waits for.
    owed: usize,
    /// Set while a write is in progress and left set if it never finished,
    /// or after the framing of stdout was lost.
    poisoned: bool,
}

impl From<EngineConnection> for EngineProcess {
    fn from(conn: EngineConnection) -> Self {
        Self {
            pid: conn.pid,
            stdin: conn.stdin,
            stdout: conn.stdout,
            exit: conn.exit,
            terminate: conn.terminate,
            monitor: conn.monitor,
            started_at: Utc::now(),
            owed: 0,
            poisoned: false,
        }
    }
}

impl EngineProcess {
    /// OS process id.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the process was spawned.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of responses owed to abandoned or timed-out exchanges.
    #[must_use]
    pub fn owed(&self) -> usize {
        self.owed
    }

    /// Record one more request whose response nobody will read.
    pub fn owe_response(&mut self) {
        self.owed += 1;
    }

    /// Exit details, once the monitor has observed the exit.
    #[must_use]
    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit.borrow().clone()
    }

    /// Whether the process has exited.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Whether the stream state is unknown and must be verified before the
    /// next exchange.
    #[must_use]
    pub fn needs_health_check(&self) -> bool {
        self.owed > 0 || self.poisoned
    }

    /// Write one pre-encoded request line and flush it.
    ///
    /// # Errors
    ///
    /// - `AppError::ProcessExited` if the pipe is closed.
    /// - `AppError::Io` for any other write failure.
    pub async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(AppError::Protocol("engine stream is out of sync".into()));
        }

        self.poisoned = true;
        let written = async {
            self.stdin.write_all(line).await?;
            self.stdin.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.poisoned = false;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(self.exited_error("stdin closed").await)
            }
            Err(err) => Err(AppError::Io(format!("write to engine failed: {err}"))),
        }
    }

    /// Wait for the next non-blank line on stdout.
    ///
    /// Cancel-safe: partially received data stays buffered in the framed
    /// reader.
    ///
    /// # Errors
    ///
    /// - `AppError::ProcessExited` on EOF or when the process exits.
    /// - `AppError::Protocol` if a line exceeds the codec limit; the stream
    ///   is poisoned afterwards.
    pub async fn recv_line(&mut self) -> Result<String> {
        loop {
            let next = tokio::select! {
                biased;
                item = self.stdout.next() => Some(item),
                _ = self.exit.wait_for(Option::is_some) => None,
            };

            match next {
                Some(Some(Ok(line))) if line.trim().is_empty() => {}
                Some(Some(Ok(line))) => return Ok(line),
                Some(Some(Err(err))) => {
                    self.poisoned = true;
                    return Err(err);
                }
                Some(None) => return Err(self.exited_error("stdout closed").await),
                None => return Err(self.exited_error("process exited").await),
            }
        }
    }

    /// Liveness check: write a `ping`, discard every response still owed to
    /// earlier requests, and decode the one that answers the ping.
    ///
    /// Any well-formed response proves the request loop is alive, even a
    /// `success: false` from an engine that does not know `ping`.
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` if the ping is not answered within `window`.
    /// - Any error from [`Self::write_line`] / [`Self::recv_line`] or
    ///   decoding.
    pub async fn probe(&mut self, window: Duration) -> Result<EngineResponse> {
        let ping = encode_request(&EngineRequest::ping())?;

        let exchange = async {
            // Counted before writing so a dropped probe leaves the ping owed.
            self.owed += 1;
            self.write_line(&ping).await?;

            loop {
                let line = self.recv_line().await?;
                self.owed -= 1;
                if self.owed == 0 {
                    return decode_response(&line);
                }
                debug!(
                    pid = ?self.pid,
                    remaining = self.owed,
                    "discarding late response owed to an earlier request"
                );
            }
        };

        tokio::time::timeout(window, exchange)
            .await
            .map_err(|_| AppError::Timeout(format!("liveness probe unanswered after {window:?}")))?
    }

    /// Terminate the process and wait (bounded) for the exit to be observed.
    pub async fn terminate(self) -> Option<ExitInfo> {
        let Self {
            pid,
            stdin,
            exit,
            terminate,
            monitor,
            ..
        } = self;

        // Closing stdin ends the engine's read loop; the signal covers
        // engines that are busy.
        drop(stdin);
        terminate.cancel();

        if tokio::time::timeout(TERMINATE_GRACE * 2, monitor)
            .await
            .is_err()
        {
            warn!(?pid, "engine exit monitor did not finish in time");
        }

        let info = exit.borrow().clone();
        info
    }

    async fn exited_error(&mut self, context: &str) -> AppError {
        let _ = tokio::time::timeout(EXIT_SETTLE, self.exit.wait_for(Option::is_some)).await;
        match self.exit_info() {
            Some(info) => AppError::ProcessExited(format!("{context}: {}", info.reason)),
            None => AppError::ProcessExited(context.to_owned()),
        }
    }
}

/// Supervisor of the single engine process.
#[derive(Debug)]
pub struct EngineProcessHandle {
    config: SpawnConfig,
    state: EngineState,
    process: Option<EngineProcess>,
    last_exit: Option<ExitInfo>,
    spawn_count: u64,
    shutdown: CancellationToken,
}

impl EngineProcessHandle {
    /// Create a stopped handle. Cancelling `shutdown` terminates any
    /// running process and refuses further spawns.
    #[must_use]
    pub fn new(config: SpawnConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            state: EngineState::Stopped,
            process: None,
            last_exit: None,
            spawn_count: 0,
            shutdown,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The attached process, if any.
    #[must_use]
    pub fn process(&self) -> Option<&EngineProcess> {
        self.process.as_ref()
    }

    /// Mutable access to the attached process.
    pub fn process_mut(&mut self) -> Option<&mut EngineProcess> {
        self.process.as_mut()
    }

    /// Number of processes spawned so far.
    #[must_use]
    pub fn spawn_count(&self) -> u64 {
        self.spawn_count
    }

    /// Exit details of the most recent process that went away.
    #[must_use]
    pub fn last_exit(&self) -> Option<&ExitInfo> {
        self.last_exit.as_ref()
    }

    /// Detach the process if it has exited. Returns `true` when one was
    /// reaped.
    pub fn reap_if_exited(&mut self) -> bool {
        let exited = self.process.as_ref().is_some_and(EngineProcess::has_exited);
        if !exited {
            return false;
        }

        if let Some(process) = self.process.take() {
            let info = process.exit_info();
            warn!(
                pid = ?process.pid(),
                code = ?info.as_ref().and_then(|i| i.code),
                "engine process is gone; it will be respawned on the next call"
            );
            self.last_exit = info;
        }
        self.state = EngineState::Stopped;
        true
    }

    /// Make sure a ready engine is attached, spawning one if needed.
    ///
    /// Idempotent: returns `Ok(false)` without spawning while a live process
    /// is attached, `Ok(true)` after spawning a new one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the process cannot be started, does not
    /// become ready, or the supervisor is shutting down.
    pub async fn ensure_started(&mut self) -> Result<bool> {
        self.reap_if_exited();
        if self.process.is_some() {
            return Ok(false);
        }

        if self.shutdown.is_cancelled() {
            return Err(AppError::Spawn("supervisor is shutting down".into()));
        }

        // Falls back to `Stopped` unless the attempt completes, including
        // when the caller's future is dropped mid-readiness.
        let attempt = StartAttempt::begin(&mut self.state);
        let conn = spawn_engine(&self.config, self.shutdown.child_token())?;
        self.spawn_count += 1;

        let mut process = EngineProcess::from(conn);
        match await_ready(&self.config, &mut process).await {
            Ok(()) => {
                info!(pid = ?process.pid(), spawn_count = self.spawn_count, "engine ready");
                self.process = Some(process);
                attempt.succeed();
                Ok(true)
            }
            Err(err) => {
                warn!(pid = ?process.pid(), %err, "engine failed to become ready");
                self.last_exit = process.terminate().await;
                Err(AppError::Spawn(format!("engine did not become ready: {err}")))
            }
        }
    }

    /// Terminate the attached process, if any.
    pub async fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            info!(pid = ?process.pid(), "stopping engine");
            if let Some(info) = process.terminate().await {
                self.last_exit = Some(info);
            }
        }
        self.state = EngineState::Stopped;
    }
}

/// Holds the handle in `Starting` for the duration of one spawn attempt.
struct StartAttempt<'a> {
    state: &'a mut EngineState,
    ready: bool,
}

impl<'a> StartAttempt<'a> {
    fn begin(state: &'a mut EngineState) -> Self {
        *state = EngineState::Starting;
        Self { state, ready: false }
    }

    fn succeed(mut self) {
        self.ready = true;
        *self.state = EngineState::Running;
    }
}

impl Drop for StartAttempt<'_> {
    fn drop(&mut self) {
        if !self.ready {
            *self.state = EngineState::Stopped;
        }
    }
}

async fn await_ready(config: &SpawnConfig, process: &mut EngineProcess) -> Result<()> {
    match config.readiness {
        Readiness::Probe => {
            let response = process.probe(config.startup_timeout).await?;
            debug!(success = response.success, "engine answered readiness probe");
            Ok(())
        }
        Readiness::Delay => {
            tokio::time::sleep(config.startup_grace).await;
            if process.has_exited() {
                return Err(process.exited_error("exited during startup").await);
            }
            Ok(())
        }
    }
}
