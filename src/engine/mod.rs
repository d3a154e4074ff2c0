//! Supervision of the external graph engine and the line protocol spoken
//! over its stdio.
//!
//! Submodules:
//! - `message`: request/response records and the operation set.
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing
//!   plus request encoding and response decoding.
//! - `spawner`: process spawning, stderr draining, and exit monitoring.
//! - `process`: the engine state machine and per-process stream handling.
//! - `bridge`: single-flight `invoke` with timeouts and stale-response
//!   recovery.

pub mod bridge;
pub mod codec;
pub mod message;
pub mod process;
pub mod spawner;

pub use bridge::{EngineBridge, EngineStatus, PendingExchange};
pub use message::{EngineRequest, EngineResponse, Operation};
pub use process::{EngineProcessHandle, EngineState};
