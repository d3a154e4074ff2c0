//! Stdio transport for the MCP client connection.
//!
//! The protocol owns stdout; logs go to stderr.

use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::handler::GraphToolServer;
use crate::{AppError, Result};

/// Serve `server` over stdio until the client disconnects or `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Mcp` if the transport fails to initialize or the
/// service ends with an error.
pub async fn serve_stdio(server: GraphToolServer, ct: CancellationToken) -> Result<()> {
    info!("starting stdio MCP transport");
    let service = server
        .serve_with_ct(stdio(), ct)
        .await
        .map_err(|err| AppError::Mcp(format!("stdio transport failed: {err}")))?;

    service
        .waiting()
        .await
        .map_err(|err| AppError::Mcp(format!("stdio service error: {err}")))?;

    info!("stdio MCP transport shut down");
    Ok(())
}

/// Log how the transport task ended. Returns `false` if it panicked or was
/// cancelled.
#[must_use]
pub fn report_task_exit(outcome: std::result::Result<(), JoinError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(err) if err.is_panic() => {
            error!(%err, "stdio transport task panicked");
            false
        }
        Err(err) => {
            error!(%err, "stdio transport task was cancelled");
            false
        }
    }
}
