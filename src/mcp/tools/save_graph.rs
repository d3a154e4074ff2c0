//! `save_graph` MCP tool handler.

use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, info_span, Instrument};

use super::util::{failure_result, text_result};
use crate::engine::{EngineBridge, EngineResponse, Operation};

/// Output formats: graph formats plus rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// Gephi exchange format.
    Gexf,
    /// `GraphML`.
    Graphml,
    /// Rendered PDF.
    Pdf,
    /// Rendered PNG.
    Png,
}

impl SaveFormat {
    /// Wire name of the format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gexf => "gexf",
            Self::Graphml => "graphml",
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

/// Arguments of `save_graph`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveGraphInput {
    /// Destination path.
    #[schemars(description = "Path where to save the graph")]
    pub file_path: String,
    /// Output format.
    #[schemars(description = "Output format")]
    pub format: SaveFormat,
}

/// Handle the `save_graph` tool call.
pub async fn handle(bridge: &EngineBridge, input: SaveGraphInput) -> CallToolResult {
    let span = info_span!("save_graph", file_path = %input.file_path, format = input.format.as_str());

    async move {
        let mut params = Map::new();
        params.insert("filePath".into(), Value::String(input.file_path.clone()));
        params.insert("format".into(), Value::String(input.format.as_str().to_owned()));

        match bridge
            .invoke(Operation::SaveGraph, params)
            .await
            .and_then(EngineResponse::into_result)
        {
            Ok(_) => {
                info!("graph saved");
                text_result(format!("Graph saved successfully to {}", input.file_path))
            }
            Err(err) => failure_result(&err),
        }
    }
    .instrument(span)
    .await
}
