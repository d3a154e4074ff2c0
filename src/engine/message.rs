//! Request and response records exchanged with the engine.
//!
//! Every request is a single JSON object `{"operation": …, "params": {…}}`;
//! every response is a single JSON object carrying at least a `success`
//! flag. Operation-specific fields are kept as an open map so that new
//! engine fields pass through untouched.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppError, Result};

/// Operations understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Load a graph file, replacing the engine's current graph.
    #[serde(rename = "load_graph")]
    LoadGraph,
    /// Run the Force Atlas 2 layout on the current graph.
    #[serde(rename = "apply_force_atlas2")]
    ApplyForceAtlas2,
    /// Report node/edge counts and status of the current graph.
    #[serde(rename = "get_graph_info")]
    GetGraphInfo,
    /// Export the current graph.
    #[serde(rename = "save_graph")]
    SaveGraph,
    /// Liveness probe; the engine answers without touching the graph.
    #[serde(rename = "ping")]
    Ping,
}

impl Operation {
    /// Wire name of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadGraph => "load_graph",
            Self::ApplyForceAtlas2 => "apply_force_atlas2",
            Self::GetGraphInfo => "get_graph_info",
            Self::SaveGraph => "save_graph",
            Self::Ping => "ping",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineRequest {
    /// Operation to perform.
    pub operation: Operation,
    /// Scalar parameters keyed by their wire names.
    pub params: Map<String, Value>,
}

impl EngineRequest {
    /// Build a request from an operation and its parameters.
    #[must_use]
    pub fn new(operation: Operation, params: Map<String, Value>) -> Self {
        Self { operation, params }
    }

    /// Build the parameterless liveness probe.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(Operation::Ping, Map::new())
    }
}

/// One inbound response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Whether the engine completed the operation.
    pub success: bool,
    /// Failure description reported by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form message reported by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation-specific fields (`nodeCount`, `edgeCount`, …).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EngineResponse {
    /// Raw access to an operation-specific field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// `nodeCount`, when reported.
    #[must_use]
    pub fn node_count(&self) -> Option<u64> {
        self.field("nodeCount").and_then(Value::as_u64)
    }

    /// `edgeCount`, when reported.
    #[must_use]
    pub fn edge_count(&self) -> Option<u64> {
        self.field("edgeCount").and_then(Value::as_u64)
    }

    /// `directed`, when reported.
    #[must_use]
    pub fn directed(&self) -> Option<bool> {
        self.field("directed").and_then(Value::as_bool)
    }

    /// `status`, when reported.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.field("status").and_then(Value::as_str)
    }

    /// `iterations`, when reported.
    #[must_use]
    pub fn iterations(&self) -> Option<i64> {
        self.field("iterations").and_then(Value::as_i64)
    }

    /// Reason to surface when `success` is false: `error`, then `message`.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("engine reported failure without a reason")
            .to_owned()
    }

    /// Turn a `success: false` response into [`AppError::EngineFailure`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::EngineFailure` carrying [`Self::failure_reason`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::EngineFailure(self.failure_reason()))
        }
    }
}
