#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod errors;
pub mod mcp;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
