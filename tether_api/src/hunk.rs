use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Half-open, zero-based range of line indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    /// First line covered (inclusive).
    pub start: u32,
    /// Line after the last one covered (exclusive).
    pub end: u32,
}

impl LineRange {
    /// Construct a range from explicit bounds.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// An empty range positioned at `at`.
    #[must_use]
    pub const fn empty(at: u32) -> Self {
        Self { start: at, end: at }
    }

    /// Number of lines covered.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range covers no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Range as `usize` indices for slicing.
    #[must_use]
    pub fn indices(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Classification of a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkKind {
    /// Lines exist only in the new text.
    Add,
    /// Lines exist only in the old text.
    Delete,
    /// Old lines are replaced by new lines.
    Change,
}

/// A maximal contiguous line-level difference between two texts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Derived from the ranges, see [`DiffHunk::new`].
    pub kind: HunkKind,
    /// Lines of the old text the hunk replaces.
    pub old_range: LineRange,
    /// Lines of the new text the hunk introduces.
    pub new_range: LineRange,
    /// Contents of `new_range`; empty for deletions.
    #[serde(default)]
    pub new_lines: Vec<String>,
}

impl DiffHunk {
    /// Build a hunk, deriving its kind from the ranges.
    ///
    /// An empty old range is an addition, an empty replacement is a
    /// deletion, anything else is a change.
    #[must_use]
    pub fn new(old_range: LineRange, new_range: LineRange, new_lines: Vec<String>) -> Self {
        let kind = if old_range.is_empty() {
            HunkKind::Add
        } else if new_lines.is_empty() {
            HunkKind::Delete
        } else {
            HunkKind::Change
        };

        Self {
            kind,
            old_range,
            new_range,
            new_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_derived_from_ranges() {
        let add = DiffHunk::new(LineRange::empty(2), LineRange::new(2, 3), vec!["x".into()]);
        assert_eq!(add.kind, HunkKind::Add);

        let delete = DiffHunk::new(LineRange::new(1, 3), LineRange::empty(1), Vec::new());
        assert_eq!(delete.kind, HunkKind::Delete);

        let change = DiffHunk::new(LineRange::new(1, 2), LineRange::new(1, 2), vec!["x".into()]);
        assert_eq!(change.kind, HunkKind::Change);
    }

    #[test]
    fn line_range_len_and_indices() {
        let range = LineRange::new(3, 7);
        assert_eq!(range.len(), 4);
        assert_eq!(range.indices(), 3..7);
        assert!(LineRange::empty(5).is_empty());
        assert_eq!(LineRange::empty(5).len(), 0);
    }

    #[test]
    fn encoded_uses_snake_case() {
        let json = serde_json::to_string(&HunkKind::Change).expect("serialize kind");
        assert_eq!(json, "\"change\"");
    }
}
