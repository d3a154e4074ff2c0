//! `load_graph` MCP tool handler.
//!
//! Replaces the engine's current graph with the contents of a file.

use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, info_span, Instrument};

use super::util::{count_text, failure_result, text_result};
use crate::engine::{EngineBridge, EngineResponse, Operation};

/// Graph formats the engine can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoadFormat {
    /// Gephi exchange format.
    Gexf,
    /// `GraphML`.
    Graphml,
    /// Graph Modelling Language.
    Gml,
    /// Graphviz DOT.
    Dot,
    /// Edge or adjacency list CSV.
    Csv,
}

impl LoadFormat {
    /// Wire name of the format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gexf => "gexf",
            Self::Graphml => "graphml",
            Self::Gml => "gml",
            Self::Dot => "dot",
            Self::Csv => "csv",
        }
    }
}

/// Arguments of `load_graph`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadGraphInput {
    /// Path to the graph file.
    #[schemars(description = "Path to the graph file")]
    pub file_path: String,
    /// Graph file format; detected from the file when omitted.
    #[schemars(description = "Graph file format")]
    pub format: Option<LoadFormat>,
}

/// Handle the `load_graph` tool call.
pub async fn handle(bridge: &EngineBridge, input: LoadGraphInput) -> CallToolResult {
    let format = input.format.map_or("auto", LoadFormat::as_str);
    let span = info_span!("load_graph", file_path = %input.file_path, format);

    async move {
        let mut params = Map::new();
        params.insert("filePath".into(), Value::String(input.file_path));
        params.insert("format".into(), Value::String(format.to_owned()));

        match bridge
            .invoke(Operation::LoadGraph, params)
            .await
            .and_then(EngineResponse::into_result)
        {
            Ok(response) => {
                info!(
                    nodes = ?response.node_count(),
                    edges = ?response.edge_count(),
                    "graph loaded"
                );
                text_result(format!(
                    "Graph loaded successfully: {} nodes, {} edges",
                    count_text(response.node_count()),
                    count_text(response.edge_count()),
                ))
            }
            Err(err) => failure_result(&err),
        }
    }
    .instrument(span)
    .await
}
