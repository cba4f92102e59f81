use serde_json::Value;

use crate::codec;
use crate::pipeline::{ContentPipeline, StreamEnding};
use crate::transcript::Transcript;
use crate::{Block, DecodeError, StreamConfig};

use super::CoreError;

type Result<T> = std::result::Result<T, CoreError>;

/// Result of decoding a complete response body in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTranscript {
    /// Blocks in delivery order, notices included.
    pub blocks: Vec<Block>,
    /// Last session identifier the backend sent.
    pub session_id: Option<String>,
    /// Display text of the failure that ended the stream.
    pub error: Option<String>,
    /// Whether that failure looked like an authentication problem.
    pub auth_error: bool,
    /// Whether the termination sentinel arrived.
    pub completed: bool,
}

/// Decode a single block from JSON text.
///
/// # Errors
///
/// Returns [`CoreError::Decode`] for malformed or unknown blocks.
pub fn decode_block(json: String) -> Result<Block> {
    codec::decode_block_str(&json).map_err(CoreError::from)
}

/// Encode a block as canonical JSON text.
#[must_use]
pub fn encode_block(block: Block) -> String {
    codec::encode_block(&block).to_string()
}

/// Decode a single block or either envelope shape into a block list.
///
/// # Errors
///
/// Returns [`CoreError::Decode`] if any part of the payload is invalid.
pub fn decode_envelope(json: String) -> Result<Vec<Block>> {
    let value: Value = serde_json::from_str(&json).map_err(DecodeError::from)?;
    codec::decode_envelope(&value).map_err(CoreError::from)
}

/// Run a buffered response body through the content pipeline.
#[must_use]
pub fn decode_stream(body: String) -> StreamTranscript {
    let mut transcript = Transcript::new();
    transcript.begin_assistant();

    let source = body.lines().map(|line| Ok(line.to_owned()));
    let outcome = ContentPipeline::new(StreamConfig::from_env()).process(source, &mut transcript);

    let (error, auth_error) = transcript
        .last_error()
        .map_or((None, false), |error| {
            (Some(error.message.clone()), error.auth_related)
        });

    StreamTranscript {
        blocks: transcript.latest_response().to_vec(),
        session_id: transcript.session_id().map(str::to_owned),
        error,
        auth_error,
        completed: outcome.ending == StreamEnding::Completed,
    }
}
