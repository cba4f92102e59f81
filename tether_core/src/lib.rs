//! Core library for Tether's assistant client.
//!
//! The crate is layered around two responsibilities:
//! - decoding the assistant's line-oriented response stream into typed
//!   content blocks
//! - computing line hunks between a document and a proposed revision and
//!   applying or discarding them one at a time

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Hunk application and the pending-hunk set for one document.
pub mod applier;
/// Block encoding, decoding and envelope handling.
pub mod codec;
/// Stream decoder configuration.
pub mod config;
/// Line-level diffing on top of libgit2.
pub mod diff;
/// Document abstraction the applier mutates.
pub mod document;
/// Public FFI surface.
pub mod ffi;
/// Drives the stream decoder and delivers blocks to a sink.
pub mod pipeline;
/// Serialized, session-scoped document editing.
pub mod session;
/// Line source handling and `data:` fragment reassembly.
pub mod stream;
/// Append-only conversation transcript.
pub mod transcript;

pub use applier::{apply_hunk, patch_lines, ApplyError, HunkApplier};
pub use codec::{decode_block, decode_envelope, encode_block, DecodeError, PayloadShape};
pub use config::StreamConfig;
pub use diff::DiffEngine;
pub use document::{Document, DocumentError, TextDocument};
pub use pipeline::{ContentPipeline, PipelineEvent, PipelineSink, StreamEnding, StreamOutcome};
pub use session::EditSession;
pub use stream::{
    CancelHandle, CancellableSource, DecoderStats, LineDecoder, StreamDecoder, StreamError,
    StreamEvent,
};
pub use tether_api::*;
pub use transcript::{Transcript, TranscriptError};

// UniFFI scaffolding refers to the tag as `crate::UniFfiTag`.
use ffi::UniFfiTag;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A block or envelope could not be decoded.
    #[error("decode error: {source}")]
    Decode {
        /// Codec failure.
        #[from]
        source: DecodeError,
    },
    /// A hunk could not be applied or resolved.
    #[error("hunk error: {source}")]
    Apply {
        /// Application failure.
        #[from]
        source: ApplyError,
    },
    /// Underlying libgit2 diff operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error bubbled up by the core library.
        #[from]
        source: git2::Error,
    },
    /// libgit2 reported a hunk that does not fit the compared texts.
    #[error("diff produced an inconsistent hunk: {detail}")]
    InconsistentDiff {
        /// Description of the mismatch.
        detail: String,
    },
    /// A previous holder of the edit session panicked mid-operation.
    #[error("edit session lock poisoned")]
    SessionPoisoned,
}

impl From<DocumentError> for Error {
    fn from(source: DocumentError) -> Self {
        Self::Apply {
            source: ApplyError::Document { source },
        }
    }
}
