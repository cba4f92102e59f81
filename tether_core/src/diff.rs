//! Line diffing and patch rendering primitives.

use std::path::Path;

use git2::{DiffOptions, Patch};
use tether_api::{DiffHunk, LineRange};

use crate::document::split_lines;
use crate::{Error, Result};

/// Entry point for diff generation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Construct a new diff engine instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compute the hunks turning `old` into `new`, ordered by old position.
    ///
    /// Lines must not contain `\n`.
    ///
    /// # Errors
    ///
    /// Returns an error if libgit2 fails to diff the buffers or reports a
    /// hunk that does not fit them.
    pub fn diff(&self, old: &[String], new: &[String]) -> Result<Vec<DiffHunk>> {
        if old == new {
            return Ok(Vec::new());
        }

        let old_buffer = join_lines(old);
        let new_buffer = join_lines(new);
        let mut options = DiffOptions::new();
        options
            .context_lines(0)
            .interhunk_lines(0)
            .minimal(true)
            .force_text(true);

        let patch = Patch::from_buffers(
            old_buffer.as_bytes(),
            None,
            new_buffer.as_bytes(),
            None,
            Some(&mut options),
        )?;

        let mut hunks = Vec::with_capacity(patch.num_hunks());
        for index in 0..patch.num_hunks() {
            let (hunk, _) = patch.hunk(index)?;
            let old_range = zero_based(hunk.old_start(), hunk.old_lines());
            let new_range = zero_based(hunk.new_start(), hunk.new_lines());

            if old_range.end as usize > old.len() {
                return Err(Error::InconsistentDiff {
                    detail: format!(
                        "old range {}..{} exceeds {} lines",
                        old_range.start,
                        old_range.end,
                        old.len()
                    ),
                });
            }
            let new_lines = new
                .get(new_range.indices())
                .ok_or_else(|| Error::InconsistentDiff {
                    detail: format!(
                        "new range {}..{} exceeds {} lines",
                        new_range.start,
                        new_range.end,
                        new.len()
                    ),
                })?
                .to_vec();

            hunks.push(DiffHunk::new(old_range, new_range, new_lines));
        }

        Ok(hunks)
    }

    /// Compute hunks between two whole texts.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`DiffEngine::diff`].
    pub fn diff_text(&self, old: &str, new: &str) -> Result<Vec<DiffHunk>> {
        self.diff(&split_lines(old), &split_lines(new))
    }

    /// Render a unified diff of `old` against `new` labelled with `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if libgit2 fails to build or print the patch.
    pub fn unified_patch(&self, path: &str, old: &[String], new: &[String]) -> Result<String> {
        let path_ref = Path::new(path);
        let original = join_lines(old);
        let updated = join_lines(new);
        let mut options = DiffOptions::new();
        options.force_text(true);

        let mut patch = Patch::from_buffers(
            original.as_bytes(),
            Some(path_ref),
            updated.as_bytes(),
            Some(path_ref),
            Some(&mut options),
        )?;

        let buffer = patch.to_buf()?;
        Ok(String::from_utf8_lossy(buffer.as_ref()).into_owned())
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut buffer = String::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in lines {
        buffer.push_str(line);
        buffer.push('\n');
    }
    buffer
}

/// Convert a 1-based hunk header position into a 0-based half-open range.
///
/// An empty side names the line *after which* the change sits, which is
/// already the 0-based insertion index.
fn zero_based(start: u32, lines: u32) -> LineRange {
    let start = if lines == 0 {
        start
    } else {
        start.saturating_sub(1)
    };
    LineRange::new(start, start + lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_api::HunkKind;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|&item| item.to_owned()).collect()
    }

    #[test]
    fn identical_inputs_have_no_hunks() -> Result<()> {
        let text = lines(&["a", "b"]);
        assert!(DiffEngine::new().diff(&text, &text)?.is_empty());
        Ok(())
    }

    #[test]
    fn single_line_change() -> Result<()> {
        let hunks = DiffEngine::new().diff(&lines(&["a", "b", "c"]), &lines(&["a", "x", "c"]))?;
        assert_eq!(
            hunks,
            vec![DiffHunk::new(
                LineRange::new(1, 2),
                LineRange::new(1, 2),
                lines(&["x"])
            )]
        );
        assert_eq!(hunks[0].kind, HunkKind::Change);
        Ok(())
    }

    #[test]
    fn insertion_and_deletion_positions() -> Result<()> {
        let hunks = DiffEngine::new().diff(
            &lines(&["a", "b", "c", "d"]),
            &lines(&["new", "a", "c", "d", "tail"]),
        )?;

        assert_eq!(hunks.len(), 3);
        assert_eq!(hunks[0].kind, HunkKind::Add);
        assert_eq!(hunks[0].old_range, LineRange::empty(0));
        assert_eq!(hunks[0].new_range, LineRange::new(0, 1));
        assert_eq!(hunks[1].kind, HunkKind::Delete);
        assert_eq!(hunks[1].old_range, LineRange::new(1, 2));
        assert!(hunks[1].new_lines.is_empty());
        assert_eq!(hunks[2].kind, HunkKind::Add);
        assert_eq!(hunks[2].old_range, LineRange::empty(4));
        assert_eq!(hunks[2].new_lines, lines(&["tail"]));
        Ok(())
    }

    #[test]
    fn empty_sides() -> Result<()> {
        let engine = DiffEngine::new();
        let added = engine.diff(&[], &lines(&["a", "b"]))?;
        assert_eq!(
            added,
            vec![DiffHunk::new(
                LineRange::empty(0),
                LineRange::new(0, 2),
                lines(&["a", "b"])
            )]
        );

        let removed = engine.diff(&lines(&["a", "b"]), &[])?;
        assert_eq!(
            removed,
            vec![DiffHunk::new(
                LineRange::new(0, 2),
                LineRange::empty(0),
                Vec::new()
            )]
        );
        Ok(())
    }

    #[test]
    fn unified_patch_mentions_changes() -> Result<()> {
        let patch = DiffEngine::new().unified_patch(
            "notes.txt",
            &lines(&["line 1", "line 2"]),
            &lines(&["line 1", "line two"]),
        )?;
        assert!(patch.contains("notes.txt"));
        assert!(patch.contains("-line 2"));
        assert!(patch.contains("+line two"));
        Ok(())
    }

    #[test]
    fn zero_based_conversion() {
        assert_eq!(zero_based(3, 2), LineRange::new(2, 4));
        assert_eq!(zero_based(3, 0), LineRange::empty(3));
        assert_eq!(zero_based(0, 0), LineRange::empty(0));
    }
}
