//! `engine_status` MCP tool handler.
//!
//! Reports the supervisor's view of the engine without sending anything
//! to it.

use rmcp::model::CallToolResult;

use super::util::json_result;
use crate::engine::EngineBridge;

/// Handle the `engine_status` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` if the status cannot be serialized.
pub async fn handle(bridge: &EngineBridge) -> Result<CallToolResult, rmcp::ErrorData> {
    json_result(&bridge.status().await)
}
