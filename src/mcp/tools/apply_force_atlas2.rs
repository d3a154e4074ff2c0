//! `apply_force_atlas2` MCP tool handler.
//!
//! Runs the Force Atlas 2 layout on the engine's current graph. Numeric
//! ranges are the engine's concern and are passed through unchecked.

use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{info, info_span, Instrument};

use super::util::{failure_result, text_result};
use crate::engine::{EngineBridge, EngineResponse, Operation};

fn default_iterations() -> Number {
    Number::from(100)
}

fn default_true() -> bool {
    true
}

fn default_gravity() -> f64 {
    1.0
}

fn default_scaling_ratio() -> f64 {
    2.0
}

/// Layout options; every field has a documented default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForceAtlas2Input {
    /// Number of iterations to run; any JSON number is forwarded as sent.
    #[serde(default = "default_iterations")]
    #[schemars(description = "Number of iterations to run (default 100)")]
    pub iterations: Number,
    /// Adjust node sizes based on degree.
    #[serde(default)]
    #[schemars(description = "Adjust node sizes based on degree (default false)")]
    pub adjust_sizes: bool,
    /// Use the Barnes-Hut approximation.
    #[serde(default = "default_true")]
    #[schemars(description = "Use Barnes-Hut optimization (default true)")]
    pub barnes_hut_optimize: bool,
    /// Gravity pulling nodes to the center.
    #[serde(default = "default_gravity")]
    #[schemars(description = "Gravity parameter (default 1.0)")]
    pub gravity: f64,
    /// Repulsion scaling.
    #[serde(default = "default_scaling_ratio")]
    #[schemars(description = "Scaling ratio (default 2.0)")]
    pub scaling_ratio: f64,
}

impl Default for ForceAtlas2Input {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            adjust_sizes: false,
            barnes_hut_optimize: default_true(),
            gravity: default_gravity(),
            scaling_ratio: default_scaling_ratio(),
        }
    }
}

/// Handle the `apply_force_atlas2` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` if the options cannot be encoded (e.g. a
/// non-finite float).
pub async fn handle(
    bridge: &EngineBridge,
    input: ForceAtlas2Input,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let span = info_span!("apply_force_atlas2", iterations = %input.iterations);

    async move {
        let params = match serde_json::to_value(&input) {
            Ok(Value::Object(params)) => params,
            Ok(_) => {
                return Err(rmcp::ErrorData::internal_error(
                    "layout options did not encode as an object",
                    None,
                ))
            }
            Err(err) => {
                return Err(rmcp::ErrorData::invalid_params(
                    format!("invalid layout options: {err}"),
                    None,
                ))
            }
        };

        let result = match bridge
            .invoke(Operation::ApplyForceAtlas2, params)
            .await
            .and_then(EngineResponse::into_result)
        {
            Ok(response) => {
                let iterations = response
                    .iterations()
                    .map_or_else(|| "unknown".to_owned(), |n| n.to_string());
                info!(%iterations, "layout applied");
                text_result(format!(
                    "Force Atlas 2 layout applied: {iterations} iterations completed"
                ))
            }
            Err(err) => failure_result(&err),
        };
        Ok(result)
    }
    .instrument(span)
    .await
}
