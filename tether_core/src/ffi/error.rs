use std::sync::PoisonError;

use thiserror::Error;

use crate::{ApplyError, DecodeError, Error};

/// Errors surfaced through the `UniFFI` bindings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Block or envelope JSON could not be decoded.
    #[error("content could not be decoded")]
    Decode,
    /// No pending hunk at the requested index.
    #[error("hunk not found")]
    HunkNotFound,
    /// Document changed since hunks were computed.
    #[error("document changed since hunks were computed")]
    StaleDocument,
    /// Hunk does not fit the document.
    #[error("hunk does not fit the document")]
    InvalidHunk,
    /// Underlying git operation failed.
    #[error("git error")]
    Git,
    /// Internal invariant failed.
    #[error("internal error")]
    Internal,
}

impl From<Error> for CoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::Decode { .. } => Self::Decode,
            Error::Apply { source } => source.into(),
            Error::Git { .. } => Self::Git,
            Error::InconsistentDiff { .. } | Error::SessionPoisoned => Self::Internal,
        }
    }
}

impl From<ApplyError> for CoreError {
    fn from(error: ApplyError) -> Self {
        match error {
            ApplyError::HunkNotFound { .. } => Self::HunkNotFound,
            ApplyError::StaleDocument => Self::StaleDocument,
            ApplyError::LineOutOfBounds { .. }
            | ApplyError::OverlappingHunks
            | ApplyError::Document { .. } => Self::InvalidHunk,
        }
    }
}

impl From<DecodeError> for CoreError {
    fn from(_: DecodeError) -> Self {
        Self::Decode
    }
}

impl<T> From<PoisonError<T>> for CoreError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Internal
    }
}
