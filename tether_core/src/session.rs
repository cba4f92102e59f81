//! Serialized, session-scoped editing of one document.

use std::sync::{Mutex, MutexGuard};

use tether_api::DiffHunk;

use crate::applier::HunkApplier;
use crate::document::Document;
use crate::{Error, Result};

/// One document plus its pending hunks, mutated under a single lock.
///
/// Every accept or reject runs together with its recompute while the lock
/// is held, so concurrent callers never observe half-applied state.
#[derive(Debug)]
pub struct EditSession<D: Document> {
    state: Mutex<EditState<D>>,
}

#[derive(Debug)]
struct EditState<D> {
    document: D,
    applier: HunkApplier,
}

impl<D: Document> EditSession<D> {
    /// Start reviewing `target` as a proposed revision of `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial diff fails.
    pub fn open(document: D, target: &str) -> Result<Self> {
        let applier = HunkApplier::new(&document, target)?;
        Ok(Self {
            state: Mutex::new(EditState { document, applier }),
        })
    }

    /// Snapshot of the pending hunks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionPoisoned`] if a previous holder panicked.
    pub fn pending(&self) -> Result<Vec<DiffHunk>> {
        Ok(self.lock()?.applier.pending().to_vec())
    }

    /// Accept the pending hunk at `index`.
    ///
    /// # Errors
    ///
    /// Propagates [`HunkApplier::accept`] failures.
    pub fn accept(&self, index: usize) -> Result<DiffHunk> {
        let mut state = self.lock()?;
        let EditState { document, applier } = &mut *state;
        applier.accept(document, index)
    }

    /// Reject the pending hunk at `index`.
    ///
    /// # Errors
    ///
    /// Propagates [`HunkApplier::reject`] failures.
    pub fn reject(&self, index: usize) -> Result<DiffHunk> {
        let mut state = self.lock()?;
        let EditState { document, applier } = &mut *state;
        applier.reject(document, index)
    }

    /// Accept every pending hunk.
    ///
    /// # Errors
    ///
    /// Propagates [`HunkApplier::accept_all`] failures.
    pub fn accept_all(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let EditState { document, applier } = &mut *state;
        applier.accept_all(document)
    }

    /// Reject every pending hunk.
    ///
    /// # Errors
    ///
    /// Propagates [`HunkApplier::reject_all`] failures.
    pub fn reject_all(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let EditState { document, applier } = &mut *state;
        applier.reject_all(document)
    }

    /// Edit the document outside of hunk resolution, then recompute.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or the recompute fails.
    pub fn edit<T>(&self, op: impl FnOnce(&mut D) -> T) -> Result<T> {
        let mut state = self.lock()?;
        let EditState { document, applier } = &mut *state;
        let value = op(document);
        applier.refresh(document)?;
        Ok(value)
    }

    /// Read the document without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionPoisoned`] if a previous holder panicked.
    pub fn with_document<T>(&self, op: impl FnOnce(&D) -> T) -> Result<T> {
        Ok(op(&self.lock()?.document))
    }

    /// Unified patch of the changes still pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or rendering fails.
    pub fn preview(&self, path: &str) -> Result<String> {
        let state = self.lock()?;
        state.applier.preview(path, &state.document)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EditState<D>>> {
        self.state.lock().map_err(|_| Error::SessionPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::document::TextDocument;

    #[test]
    fn accept_and_reject_through_session() -> Result<()> {
        let session = EditSession::open(TextDocument::new("a\nb\nc\n"), "A\nb\nC\n")?;
        assert_eq!(session.pending()?.len(), 2);

        session.reject(0)?;
        session.accept(0)?;

        assert!(session.pending()?.is_empty());
        assert_eq!(
            session.with_document(|document| document.as_str().to_owned())?,
            "a\nb\nC\n"
        );
        Ok(())
    }

    #[test]
    fn edit_recomputes_pending_hunks() -> Result<()> {
        let session = EditSession::open(TextDocument::new("a\nb\n"), "a\nc\n")?;
        session.edit(|document| document.set_text("a\nc\n"))?;
        assert!(session.pending()?.is_empty());
        Ok(())
    }

    #[test]
    fn poisoned_session_reports_error() {
        let session = Arc::new(
            EditSession::open(TextDocument::new("a\n"), "b\n").expect("open session"),
        );
        let poisoner = Arc::clone(&session);
        let joined = thread::spawn(move || {
            let _ = poisoner.edit(|_| panic!("editor crashed"));
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(session.pending(), Err(Error::SessionPoisoned)));
    }
}
