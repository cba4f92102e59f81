use std::sync::Arc;

use crate::{
    diff::DiffEngine,
    document::TextDocument,
    session::EditSession,
    DiffHunk,
};

use super::CoreError;

type Result<T> = std::result::Result<T, CoreError>;

/// Document under review, exposed to Swift via `UniFFI`.
#[derive(Debug)]
pub struct DocumentSession {
    session: EditSession<TextDocument>,
}

impl DocumentSession {
    /// Current document text.
    ///
    /// # Errors
    ///
    /// Returns an error when the session lock is poisoned.
    pub fn text(&self) -> Result<String> {
        self.session
            .with_document(|document| document.as_str().to_owned())
            .map_err(CoreError::from)
    }

    /// Hunks awaiting a decision.
    ///
    /// # Errors
    ///
    /// Returns an error when the session lock is poisoned.
    pub fn pending(&self) -> Result<Vec<DiffHunk>> {
        self.session.pending().map_err(CoreError::from)
    }

    /// Accept the hunk at `index` and return it.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown index, a stale document, or a hunk that
    /// no longer fits.
    pub fn accept(&self, index: u32) -> Result<DiffHunk> {
        self.session
            .accept(index as usize)
            .map_err(CoreError::from)
    }

    /// Reject the hunk at `index` and return it.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown index or a stale document.
    pub fn reject(&self, index: u32) -> Result<DiffHunk> {
        self.session
            .reject(index as usize)
            .map_err(CoreError::from)
    }

    /// Accept everything pending.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`EditSession::accept_all`].
    pub fn accept_all(&self) -> Result<u32> {
        let count = self.session.accept_all().map_err(CoreError::from)?;
        u32::try_from(count).map_err(|_| CoreError::Internal)
    }

    /// Reject everything pending.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`EditSession::reject_all`].
    pub fn reject_all(&self) -> Result<u32> {
        let count = self.session.reject_all().map_err(CoreError::from)?;
        u32::try_from(count).map_err(|_| CoreError::Internal)
    }

    /// Replace the text after the host edited its buffer; returns the
    /// recomputed hunks.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned or the diff fails.
    pub fn replace_text(&self, text: String) -> Result<Vec<DiffHunk>> {
        self.session
            .edit(|document| document.set_text(text))
            .map_err(CoreError::from)?;
        self.pending()
    }

    /// Unified patch of the pending changes labelled with `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when libgit2 cannot render the patch.
    pub fn preview_patch(&self, path: String) -> Result<String> {
        self.session.preview(&path).map_err(CoreError::from)
    }
}

/// Diff two line lists via the `UniFFI` namespace function.
///
/// # Errors
///
/// Returns an error when libgit2 fails to diff the inputs.
pub fn diff_lines(old_lines: Vec<String>, new_lines: Vec<String>) -> Result<Vec<DiffHunk>> {
    DiffEngine::new()
        .diff(&old_lines, &new_lines)
        .map_err(CoreError::from)
}

/// Open a review session for `proposed` against `text`.
///
/// # Errors
///
/// Returns an error when the initial diff fails.
pub fn open_document_session(text: String, proposed: String) -> Result<Arc<DocumentSession>> {
    let session = EditSession::open(TextDocument::new(text), &proposed).map_err(CoreError::from)?;
    Ok(Arc::new(DocumentSession { session }))
}
