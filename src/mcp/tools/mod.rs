//! MCP tool handlers. Each handler issues at most one engine exchange.

pub mod apply_force_atlas2;
pub mod engine_status;
pub mod get_graph_info;
pub mod load_graph;
pub mod save_graph;
pub mod util;
