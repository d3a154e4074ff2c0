//! Engine process spawner.
//!
//! Spawns the engine with:
//! - piped stdin/stdout for the line protocol and a piped stderr that is
//!   drained into `tracing` by a background task,
//! - `kill_on_drop(true)` so an orphaned handle never leaks a JVM,
//! - the inherited environment with `PATH` prefixed by the configured tool
//!   directory.
//!
//! A monitor task owns the [`Child`] and publishes an [`ExitInfo`] on a
//! [`watch`] channel once the process is gone, whether it exited on its own
//! or was terminated through the cancellation token.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::EngineCodec;
use crate::config::Readiness;
use crate::{AppError, Result};

/// How long a terminated engine gets between `SIGTERM` and `SIGKILL`.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Parameters for launching the engine process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program to execute (normally the Java launcher).
    pub program: OsString,
    /// Arguments passed to `program`.
    pub args: Vec<OsString>,
    /// Working directory; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Directory prepended to the inherited `PATH`.
    pub path_prefix: Option<String>,
    /// Readiness strategy applied after spawn.
    pub readiness: Readiness,
    /// Fixed delay for [`Readiness::Delay`].
    pub startup_grace: Duration,
    /// Upper bound for [`Readiness::Probe`].
    pub startup_timeout: Duration,
}

/// Why and when the engine process went away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    /// Exit code, absent when terminated by a signal.
    pub code: Option<i32>,
    /// Human-readable exit description.
    pub reason: String,
    /// When the exit was observed.
    pub exited_at: DateTime<Utc>,
}

/// Stdio and lifecycle handles of a freshly spawned engine.
#[derive(Debug)]
pub struct EngineConnection {
    /// OS process id, when the platform reports one.
    pub pid: Option<u32>,
    /// Engine's stdin for request lines.
    pub stdin: ChildStdin,
    /// Framed engine stdout yielding one response line at a time.
    pub stdout: FramedRead<ChildStdout, EngineCodec>,
    /// Becomes `Some` once the process has exited.
    pub exit: watch::Receiver<Option<ExitInfo>>,
    /// Cancelling this token terminates the process.
    pub terminate: CancellationToken,
    /// Monitor task that owns the [`Child`].
    pub monitor: JoinHandle<()>,
}

/// Spawn the engine process and start its stderr drain and exit monitor.
///
/// `terminate` is handed to the monitor; cancelling it (or any parent
/// token) sends `SIGTERM`, then kills after [`TERMINATE_GRACE`].
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn engine: …")`: OS spawn failure.
/// - `AppError::Spawn("failed to capture engine …")`: a pipe is missing.
pub fn spawn_engine(config: &SpawnConfig, terminate: CancellationToken) -> Result<EngineConnection> {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args);

    if let Some(ref prefix) = config.path_prefix {
        let mut paths = vec![PathBuf::from(prefix)];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        let joined = std::env::join_paths(paths)
            .map_err(|err| AppError::Spawn(format!("invalid path prefix: {err}")))?;
        cmd.env("PATH", joined);
    }

    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!(
            "failed to spawn engine `{}`: {err}",
            config.program.to_string_lossy()
        ))
    })?;

    let pid = child.id();

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture engine stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture engine stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture engine stderr".into()))?;

    info!(?pid, program = %config.program.to_string_lossy(), "engine process spawned");

    tokio::spawn(drain_stderr(pid, stderr));

    let (exit_tx, exit_rx) = watch::channel(None);
    let monitor = monitor_exit(pid, child, exit_tx, terminate.clone());

    Ok(EngineConnection {
        pid,
        stdin,
        stdout: FramedRead::new(stdout, EngineCodec::new()),
        exit: exit_rx,
        terminate,
        monitor,
    })
}

/// Spawn a background task that awaits child-process exit and publishes
/// the resulting [`ExitInfo`].
///
/// When `terminate` fires first the task sends `SIGTERM` (unix), waits up
/// to [`TERMINATE_GRACE`], then kills the process.
#[must_use]
pub fn monitor_exit(
    pid: Option<u32>,
    mut child: Child,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    terminate: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let info = tokio::select! {
            result = child.wait() => exit_info(result),
            () = terminate.cancelled() => {
                debug!(?pid, "engine termination requested");
                exit_info(terminate_child(pid, &mut child).await)
            }
        };

        info!(?pid, code = ?info.code, reason = %info.reason, "engine process exited");
        exit_tx.send_replace(Some(info));
    })
}

/// Ask the process to stop, then kill it if it ignores the request.
async fn terminate_child(pid: Option<u32>, child: &mut Child) -> std::io::Result<ExitStatus> {
    send_sigterm(pid);

    if let Ok(result) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        return result;
    }

    warn!(?pid, "engine ignored SIGTERM, killing");
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
fn send_sigterm(pid: Option<u32>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(pid = raw, %err, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: Option<u32>) {}

fn exit_info(result: std::io::Result<ExitStatus>) -> ExitInfo {
    let (code, reason) = match result {
        Ok(status) => {
            let code = status.code();
            let reason = code.map_or_else(
                || "process terminated by signal".to_owned(),
                |c| format!("process exited with code {c}"),
            );
            (code, reason)
        }
        Err(err) => (None, format!("wait error: {err}")),
    };

    ExitInfo {
        code,
        reason,
        exited_at: Utc::now(),
    }
}

/// Forward every stderr line to the log until the stream closes.
async fn drain_stderr(pid: Option<u32>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "engine::stderr", ?pid, "{line}"),
            Ok(None) => break,
            Err(err) => {
                debug!(?pid, %err, "engine stderr read failed");
                break;
            }
        }
    }
}
