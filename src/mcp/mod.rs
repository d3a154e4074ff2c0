//! Model Context Protocol server layer.

pub mod handler;
pub mod tools;
pub mod transport;
