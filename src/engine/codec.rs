//! Line protocol codec for the engine's stdio streams.
//!
//! Inbound framing wraps [`tokio_util::codec::LinesCodec`] with a maximum
//! line length, so partial reads are buffered until the `\n` arrives and
//! several lines delivered in one read are yielded one at a time. Outbound
//! requests are compact JSON followed by a single `\n`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use graph_engine_bridge::engine::codec::EngineCodec;
//!
//! let lines = FramedRead::new(child_stdout, EngineCodec::new());
//! ```

use std::io::ErrorKind;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::debug;

use super::message::{EngineRequest, EngineResponse};
use crate::{AppError, Result};

/// Maximum line length accepted from the engine: 1 MiB.
///
/// Lines exceeding this limit cause [`EngineCodec::decode`] to return
/// [`AppError::Protocol`] with `"line too long"`. Invalid UTF-8 is
/// [`AppError::Protocol`] with `"undecodable response"`.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line decoder for the engine's stdout.
///
/// Each `\n`-terminated UTF-8 line (with an optional trailing `\r`
/// stripped) is one complete response record.
#[derive(Debug)]
pub struct EngineCodec(LinesCodec);

impl EngineCodec {
    /// Create a new `EngineCodec` with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for EngineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EngineCodec {
    type Item = String;
    type Error = AppError;

    /// Returns `Ok(None)` while `src` holds no complete line yet.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Yields the remaining complete lines; an unterminated tail is not a
    /// record and is dropped so the stream ends.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if !src.is_empty() {
            debug!(
                bytes = src.len(),
                tail = %String::from_utf8_lossy(src),
                "dropping unterminated fragment at end of stream"
            );
            src.clear();
            self.0 = LinesCodec::new_with_max_length(MAX_LINE_BYTES);
        }
        Ok(None)
    }
}

/// Serialize `request` into one `\n`-terminated line.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] if serialization fails or the encoded
/// record would contain a line terminator.
pub fn encode_request(request: &EngineRequest) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(request)
        .map_err(|err| AppError::Protocol(format!("failed to encode request: {err}")))?;

    // Compact JSON escapes control characters, so this only guards against
    // a serializer change.
    if bytes.iter().any(|&b| b == b'\n' || b == b'\r') {
        return Err(AppError::Protocol(
            "encoded request contains a line terminator".into(),
        ));
    }

    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse one decoded line into an [`EngineResponse`].
///
/// # Errors
///
/// Returns [`AppError::Protocol`]`("malformed response: …")` when the line is
/// not a JSON object with a boolean `success` field.
pub fn decode_response(line: &str) -> Result<EngineResponse> {
    serde_json::from_str(line.trim())
        .map_err(|err| AppError::Protocol(format!("malformed response: {err}")))
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) if io_err.kind() == ErrorKind::InvalidData => {
            AppError::Protocol(format!("undecodable response: {io_err}"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
