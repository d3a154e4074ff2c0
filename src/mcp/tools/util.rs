//! Shared result shaping for MCP tool handlers.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::AppError;

/// Successful plain-text result.
#[must_use]
pub fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Successful result carrying pretty-printed JSON text.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` if `data` cannot be serialized.
pub fn json_result<T: Serialize>(data: &T) -> Result<CallToolResult, rmcp::ErrorData> {
    let json = serde_json::to_string_pretty(data).map_err(|err| {
        rmcp::ErrorData::internal_error(format!("failed to serialize tool result: {err}"), None)
    })?;
    Ok(text_result(json))
}

/// Error result (`is_error: true`) carrying the failure's message.
///
/// Engine-reported failures carry the engine's text verbatim; every other
/// failure carries its kind prefix (`timeout: …`, `spawn failure: …`).
#[must_use]
pub fn failure_result(err: &AppError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(err.to_string())])
}

/// Copy the named keys that are present in `fields`, in order.
#[must_use]
pub fn pick_fields(fields: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|&key| fields.get(key).map(|value| (key.to_owned(), value.clone())))
        .collect()
}

/// Render an optional count the way a person reads it.
#[must_use]
pub fn count_text(count: Option<u64>) -> String {
    count.map_or_else(|| "unknown".to_owned(), |n| n.to_string())
}
