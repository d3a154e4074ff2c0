//! MCP server handler and tool router.

use std::sync::Arc;

use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::{CallToolResult, ServerCapabilities, ServerInfo, Tool};
use rmcp::{tool, tool_handler, tool_router};

use super::tools::{
    apply_force_atlas2, engine_status, get_graph_info, load_graph, save_graph,
};
use crate::engine::EngineBridge;

/// MCP server exposing the graph engine's operations as tools.
#[derive(Clone)]
pub struct GraphToolServer {
    bridge: Arc<EngineBridge>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GraphToolServer {
    /// Create a server dispatching to `bridge`.
    #[must_use]
    pub fn new(bridge: Arc<EngineBridge>) -> Self {
        Self {
            bridge,
            tool_router: Self::tool_router(),
        }
    }

    /// The engine bridge shared by all tool calls.
    #[must_use]
    pub fn bridge(&self) -> &Arc<EngineBridge> {
        &self.bridge
    }

    /// Every tool this server advertises.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    /// Load a graph file into the engine.
    #[tool(description = "Load a graph from file (GEXF, GraphML, GML, DOT, CSV)")]
    async fn load_graph(
        &self,
        Parameters(input): Parameters<load_graph::LoadGraphInput>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        Ok(load_graph::handle(&self.bridge, input).await)
    }

    /// Run Force Atlas 2 on the loaded graph.
    #[tool(description = "Apply Force Atlas 2 layout algorithm")]
    async fn apply_force_atlas2(
        &self,
        Parameters(input): Parameters<apply_force_atlas2::ForceAtlas2Input>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        apply_force_atlas2::handle(&self.bridge, input).await
    }

    /// Summarize the loaded graph.
    #[tool(description = "Get basic information about the loaded graph")]
    async fn get_graph_info(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        get_graph_info::handle(&self.bridge).await
    }

    /// Export the loaded graph.
    #[tool(description = "Save the current graph to file")]
    async fn save_graph(
        &self,
        Parameters(input): Parameters<save_graph::SaveGraphInput>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        Ok(save_graph::handle(&self.bridge, input).await)
    }

    /// Report engine process state.
    #[tool(
        description = "Report the engine process state: pid, uptime start, spawn count, owed responses and last exit"
    )]
    async fn engine_status(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        engine_status::handle(&self.bridge).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for GraphToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Graph analysis server backed by a Gephi engine process: load a graph, \
                 run Force Atlas 2, inspect it, and save it. Calls are executed one at a time."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
