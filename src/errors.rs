//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The engine process could not be started or never became ready.
    Spawn(String),
    /// No response arrived from the engine within the exchange window.
    Timeout(String),
    /// The engine produced a malformed or undecodable response.
    Protocol(String),
    /// The engine answered with `success: false`; carries its reason verbatim.
    EngineFailure(String),
    /// The engine process terminated while an exchange was outstanding.
    ProcessExited(String),
    /// MCP protocol or tool dispatch failure.
    Mcp(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn failure: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Protocol(msg) => write!(f, "engine protocol error: {msg}"),
            Self::EngineFailure(msg) => write!(f, "{msg}"),
            Self::ProcessExited(msg) => write!(f, "engine process exited: {msg}"),
            Self::Mcp(msg) => write!(f, "mcp: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
