//! Unit tests for the advertised MCP tool surface.

use std::sync::Arc;

use serde_json::Value;

use graph_engine_bridge::config::EngineConfig;
use graph_engine_bridge::engine::EngineBridge;
use graph_engine_bridge::mcp::handler::GraphToolServer;

fn server() -> GraphToolServer {
    // No process is spawned until a tool is called.
    let bridge = EngineBridge::from_config(&EngineConfig {
        command: Some(vec!["unused-engine".into()]),
        ..EngineConfig::default()
    })
    .expect("bridge");
    GraphToolServer::new(Arc::new(bridge))
}

fn property_names(server: &GraphToolServer, tool: &str) -> Vec<String> {
    let tools = server.tools();
    let tool = tools
        .iter()
        .find(|t| t.name == tool)
        .unwrap_or_else(|| panic!("tool {tool} is advertised"));
    tool.input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn all_tools_are_advertised() {
    let server = server();
    let mut names: Vec<String> = server.tools().iter().map(|t| t.name.to_string()).collect();
    names.sort();

    assert_eq!(
        names,
        vec![
            "apply_force_atlas2",
            "engine_status",
            "get_graph_info",
            "load_graph",
            "save_graph"
        ]
    );
}

#[test]
fn every_tool_has_a_description() {
    for tool in server().tools() {
        assert!(
            tool.description.as_deref().is_some_and(|d| !d.is_empty()),
            "{} has no description",
            tool.name
        );
    }
}

/// Arguments use the engine's camelCase wire names.
#[test]
fn argument_names_are_camel_case() {
    let server = server();

    let mut load = property_names(&server, "load_graph");
    load.sort();
    assert_eq!(load, vec!["filePath", "format"]);

    let mut layout = property_names(&server, "apply_force_atlas2");
    layout.sort();
    assert_eq!(
        layout,
        vec!["adjustSizes", "barnesHutOptimize", "gravity", "iterations", "scalingRatio"]
    );

    let mut save = property_names(&server, "save_graph");
    save.sort();
    assert_eq!(save, vec!["filePath", "format"]);
}

#[test]
fn server_info_enables_tools() {
    use rmcp::ServerHandler;

    let info = server().get_info();
    assert!(info.capabilities.tools.is_some());
    assert!(info.instructions.is_some());
}
