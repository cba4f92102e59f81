//! Applying hunks to a live document and tracking the ones still pending.
//!
//! The pending list is never offset-shifted. After every accept or reject
//! the applier diffs the document's current lines against its target text
//! again, so indices always refer to the freshly computed list.

use std::ops::Range;

use tether_api::{DiffHunk, HunkKind};
use tracing::debug;

use crate::diff::DiffEngine;
use crate::document::{Document, DocumentError, LineIndex};

/// Errors raised while applying or resolving hunks.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Hunk references lines the document does not have.
    #[error("line {line} is out of bounds for a document of {line_count} lines")]
    LineOutOfBounds {
        /// Offending line bound.
        line: usize,
        /// Lines present in the document.
        line_count: usize,
    },
    /// No pending hunk at the requested index.
    #[error("no pending hunk at index {index} ({pending} pending)")]
    HunkNotFound {
        /// Requested index.
        index: usize,
        /// Size of the pending list.
        pending: usize,
    },
    /// Document changed since the pending hunks were computed.
    #[error("document changed since hunks were computed; refresh first")]
    StaleDocument,
    /// Hunks are not ordered by old position or overlap each other.
    #[error("hunks overlap or are out of order")]
    OverlappingHunks,
    /// Document rejected an edit.
    #[error("document edit failed: {source}")]
    Document {
        /// Underlying document error.
        #[from]
        source: DocumentError,
    },
}

/// Apply one hunk to `document`.
///
/// Add inserts `new_lines` before line `old_range.start`, Delete removes
/// `old_range`, Change replaces `old_range` with `new_lines`.
///
/// # Errors
///
/// Returns [`ApplyError::LineOutOfBounds`] when the old range does not fit
/// the document, or a document error if the edit itself is refused.
pub fn apply_hunk<D: Document + ?Sized>(document: &mut D, hunk: &DiffHunk) -> Result<(), ApplyError> {
    let range = hunk.old_range.indices();
    match hunk.kind {
        HunkKind::Add => splice(document, range.start..range.start, &hunk.new_lines),
        HunkKind::Delete => splice(document, range, &[]),
        HunkKind::Change => splice(document, range, &hunk.new_lines),
    }
}

/// Apply `hunks`, ordered by old position, to a copy of `old`.
///
/// Applying `DiffEngine::diff(old, new)` this way reproduces `new`.
///
/// # Errors
///
/// Fails when hunks overlap, are out of order, or reach past `old`.
pub fn patch_lines(old: &[String], hunks: &[DiffHunk]) -> Result<Vec<String>, ApplyError> {
    let mut output = Vec::with_capacity(old.len());
    let mut cursor = 0;

    for hunk in hunks {
        let range = hunk.old_range.indices();
        if range.start < cursor || range.start > range.end {
            return Err(ApplyError::OverlappingHunks);
        }
        if range.end > old.len() {
            return Err(ApplyError::LineOutOfBounds {
                line: range.end,
                line_count: old.len(),
            });
        }

        output.extend_from_slice(&old[cursor..range.start]);
        output.extend(hunk.new_lines.iter().cloned());
        cursor = range.end;
    }

    output.extend_from_slice(&old[cursor..]);
    Ok(output)
}

/// Replace the document lines in `lines` with `new_lines`, keeping the
/// document's trailing-newline convention intact.
fn splice<D: Document + ?Sized>(
    document: &mut D,
    lines: Range<usize>,
    new_lines: &[String],
) -> Result<(), ApplyError> {
    let text = document.text();
    let index = LineIndex::new(&text);
    let line_count = index.line_count();
    if lines.start > lines.end || lines.end > line_count {
        return Err(ApplyError::LineOutOfBounds {
            line: lines.end.max(lines.start),
            line_count,
        });
    }

    let out_of_bounds = |line| ApplyError::LineOutOfBounds { line, line_count };
    let mut start = index.offset(lines.start).ok_or_else(|| out_of_bounds(lines.start))?;
    let end = index.offset(lines.end).ok_or_else(|| out_of_bounds(lines.end))?;

    // An unterminated last line has no `\n` of its own to carry along.
    let open_tail = lines.end == line_count && index.has_open_tail();
    let insert = if open_tail {
        let mut insert = match (lines.is_empty(), new_lines.is_empty()) {
            (true, true) => String::new(),
            (true, false) => format!("\n{}", new_lines.join("\n")),
            (false, true) => {
                // Take the separator before the removed tail with it, unless
                // that separator is all a blank line consists of.
                let previous_blank =
                    lines.start > 0 && index.offset(lines.start - 1) == Some(start - 1);
                if lines.start > 0 && !previous_blank {
                    start -= 1;
                }
                String::new()
            }
            (false, false) => new_lines.join("\n"),
        };
        // A blank last line only exists once it is terminated.
        if new_lines.last().is_some_and(String::is_empty) {
            insert.push('\n');
        }
        insert
    } else {
        new_lines.iter().fold(String::new(), |mut buffer, line| {
            buffer.push_str(line);
            buffer.push('\n');
            buffer
        })
    };
    drop(text);

    if start < end {
        document.delete(start..end)?;
    }
    if !insert.is_empty() {
        document.insert(start, &insert)?;
    }
    Ok(())
}

/// Pending hunks between one document and the text proposed for it.
#[derive(Debug, Clone)]
pub struct HunkApplier {
    engine: DiffEngine,
    target: Vec<String>,
    baseline: Vec<String>,
    pending: Vec<DiffHunk>,
}

impl HunkApplier {
    /// Diff `document` against `target` and start tracking the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff engine fails.
    pub fn new<D: Document + ?Sized>(document: &D, target: &str) -> crate::Result<Self> {
        let mut applier = Self {
            engine: DiffEngine::new(),
            target: crate::document::split_lines(target),
            baseline: Vec::new(),
            pending: Vec::new(),
        };
        applier.refresh(document)?;
        Ok(applier)
    }

    /// Hunks still awaiting a decision, ordered by document position.
    #[must_use]
    pub fn pending(&self) -> &[DiffHunk] {
        &self.pending
    }

    /// Lines the document converges to once every pending hunk is accepted.
    #[must_use]
    pub fn target_lines(&self) -> &[String] {
        &self.target
    }

    /// Whether every hunk has been accepted or rejected.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.pending.is_empty()
    }

    /// Recompute the pending hunks against the document as it is now.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff engine fails.
    pub fn refresh<D: Document + ?Sized>(&mut self, document: &D) -> crate::Result<()> {
        self.baseline = document.lines();
        self.pending = self.engine.diff(&self.baseline, &self.target)?;
        Ok(())
    }

    /// Apply the pending hunk at `index` to `document`.
    ///
    /// # Errors
    ///
    /// Fails with [`ApplyError::StaleDocument`] if the document changed since
    /// the last recompute, [`ApplyError::HunkNotFound`] for a bad index, or
    /// any error raised while editing the document.
    pub fn accept<D: Document + ?Sized>(
        &mut self,
        document: &mut D,
        index: usize,
    ) -> crate::Result<DiffHunk> {
        self.ensure_current(document)?;
        let hunk = self.hunk(index)?;
        apply_hunk(document, &hunk)?;
        self.refresh(document)?;
        debug!(index, kind = ?hunk.kind, remaining = self.pending.len(), "accepted hunk");
        Ok(hunk)
    }

    /// Drop the pending hunk at `index` without touching `document`.
    ///
    /// The target takes back the document's lines for that hunk, so the
    /// hunk disappears from the recomputed list and the others remain.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HunkApplier::accept`], minus document edits.
    pub fn reject<D: Document + ?Sized>(
        &mut self,
        document: &D,
        index: usize,
    ) -> crate::Result<DiffHunk> {
        self.ensure_current(document)?;
        let hunk = self.hunk(index)?;
        let restored = self.baseline[hunk.old_range.indices()].to_vec();
        self.target.splice(hunk.new_range.indices(), restored);
        self.pending = self.engine.diff(&self.baseline, &self.target)?;
        debug!(index, kind = ?hunk.kind, remaining = self.pending.len(), "rejected hunk");
        Ok(hunk)
    }

    /// Apply every pending hunk. Returns how many were applied.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HunkApplier::accept`].
    pub fn accept_all<D: Document + ?Sized>(&mut self, document: &mut D) -> crate::Result<usize> {
        self.ensure_current(document)?;
        let count = self.pending.len();
        // Back to front so earlier line positions stay valid.
        for hunk in self.pending.iter().rev() {
            apply_hunk(document, hunk)?;
        }
        self.refresh(document)?;
        debug!(count, "accepted all hunks");
        Ok(count)
    }

    /// Discard every pending hunk. Returns how many were discarded.
    ///
    /// # Errors
    ///
    /// Fails with [`ApplyError::StaleDocument`] if the document changed
    /// since the last recompute.
    pub fn reject_all<D: Document + ?Sized>(&mut self, document: &D) -> crate::Result<usize> {
        self.ensure_current(document)?;
        let count = self.pending.len();
        self.target.clone_from(&self.baseline);
        self.pending.clear();
        debug!(count, "rejected all hunks");
        Ok(count)
    }

    /// Unified patch from the document's current text to the target.
    ///
    /// # Errors
    ///
    /// Returns an error if libgit2 fails to render the patch.
    pub fn preview<D: Document + ?Sized>(&self, path: &str, document: &D) -> crate::Result<String> {
        self.engine.unified_patch(path, &document.lines(), &self.target)
    }

    fn ensure_current<D: Document + ?Sized>(&self, document: &D) -> Result<(), ApplyError> {
        if document.lines() == self.baseline {
            Ok(())
        } else {
            Err(ApplyError::StaleDocument)
        }
    }

    fn hunk(&self, index: usize) -> Result<DiffHunk, ApplyError> {
        self.pending
            .get(index)
            .cloned()
            .ok_or(ApplyError::HunkNotFound {
                index,
                pending: self.pending.len(),
            })
    }
}
