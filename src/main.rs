#![forbid(unsafe_code)]

//! `graph-engine-bridge`: MCP server fronting a Gephi graph engine.
//!
//! Bootstraps configuration and logging, then serves the graph tools over
//! stdio. The engine process is spawned on the first tool call and
//! terminated on shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use graph_engine_bridge::config::GlobalConfig;
use graph_engine_bridge::engine::EngineBridge;
use graph_engine_bridge::mcp::handler::GraphToolServer;
use graph_engine_bridge::mcp::transport;
use graph_engine_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "graph-engine-bridge", about = "MCP server for a Gephi graph engine", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the installation root holding the engine classpath.
    #[arg(long)]
    install_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("graph-engine-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };

    if let Some(ref root) = args.install_root {
        config.set_install_root(root)?;
    }
    info!("configuration loaded");

    let bridge = Arc::new(EngineBridge::from_config(&config.engine)?);
    let server = GraphToolServer::new(Arc::clone(&bridge));

    let ct = CancellationToken::new();
    let stdio_ct = ct.clone();
    let mut stdio_handle = tokio::spawn(async move {
        if let Err(err) = transport::serve_stdio(server, stdio_ct).await {
            error!(%err, "stdio transport failed");
        }
    });

    info!("MCP server ready");

    let finished_first = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
        outcome = &mut stdio_handle => {
            info!("client disconnected");
            Some(outcome)
        }
    };
    ct.cancel();

    bridge.shutdown().await;

    let outcome = match finished_first {
        Some(outcome) => outcome,
        None => stdio_handle.await,
    };
    if !transport::report_task_exit(outcome) {
        return Err(AppError::Mcp("stdio transport task failed".into()));
    }
    info!("graph-engine-bridge shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
