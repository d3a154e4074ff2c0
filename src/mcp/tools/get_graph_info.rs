//! `get_graph_info` MCP tool handler.
//!
//! Reports the engine's current graph as-is: the summary is returned even
//! when the engine flags the request as unsuccessful.

use rmcp::model::CallToolResult;
use tracing::{debug, info_span, Instrument};

use super::util::{failure_result, json_result, pick_fields};
use crate::engine::{EngineBridge, Operation};

/// Fields copied from the engine response into the summary.
pub const SUMMARY_FIELDS: &[&str] = &["nodeCount", "edgeCount", "directed", "status"];

/// Handle the `get_graph_info` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` if the summary cannot be serialized.
pub async fn handle(bridge: &EngineBridge) -> Result<CallToolResult, rmcp::ErrorData> {
    async move {
        match bridge.invoke(Operation::GetGraphInfo, serde_json::Map::new()).await {
            Ok(response) => {
                debug!(success = response.success, "graph info received");
                json_result(&pick_fields(&response.fields, SUMMARY_FIELDS))
            }
            Err(err) => Ok(failure_result(&err)),
        }
    }
    .instrument(info_span!("get_graph_info"))
    .await
}
