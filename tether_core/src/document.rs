//! The editable text the hunk applier operates on.
//!
//! Lines are separated by `\n`. A trailing `\n` terminates the last line
//! rather than opening an empty one, so `"a\nb\n"` and `"a\nb"` both hold
//! two lines.

use std::borrow::Cow;
use std::ops::Range;

/// Text owned by a host editor, mutable only through offset-based edits.
pub trait Document {
    /// Current full text.
    fn text(&self) -> Cow<'_, str>;

    /// Insert `text` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error when `offset` is past the end or not on a character
    /// boundary.
    fn insert(&mut self, offset: usize, text: &str) -> Result<(), DocumentError>;

    /// Remove the bytes in `range`.
    ///
    /// # Errors
    ///
    /// Returns an error when the range is inverted, out of bounds, or splits
    /// a character.
    fn delete(&mut self, range: Range<usize>) -> Result<(), DocumentError>;

    /// Current text split into lines.
    fn lines(&self) -> Vec<String> {
        split_lines(&self.text())
    }
}

/// Errors surfaced by document primitives.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    /// Offset lies past the end of the text.
    #[error("offset {offset} is out of bounds for text of length {len}")]
    OffsetOutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Text length in bytes.
        len: usize,
    },
    /// Offset falls inside a multi-byte character.
    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary {
        /// Requested offset.
        offset: usize,
    },
    /// Range start exceeds range end.
    #[error("range is invalid (start {start} > end {end})")]
    InvalidRange {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
    },
}

/// In-memory document backed by a `String`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDocument {
    text: String,
}

impl TextDocument {
    /// Wrap existing text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Borrow the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Replace the whole text, as a host does after the user edits.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Take the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    fn check_offset(&self, offset: usize) -> Result<(), DocumentError> {
        if offset > self.text.len() {
            return Err(DocumentError::OffsetOutOfBounds {
                offset,
                len: self.text.len(),
            });
        }
        if !self.text.is_char_boundary(offset) {
            return Err(DocumentError::NotCharBoundary { offset });
        }
        Ok(())
    }
}

impl Document for TextDocument {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }

    fn insert(&mut self, offset: usize, text: &str) -> Result<(), DocumentError> {
        self.check_offset(offset)?;
        self.text.insert_str(offset, text);
        Ok(())
    }

    fn delete(&mut self, range: Range<usize>) -> Result<(), DocumentError> {
        if range.start > range.end {
            return Err(DocumentError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        self.check_offset(range.start)?;
        self.check_offset(range.end)?;
        self.text.replace_range(range, "");
        Ok(())
    }
}

/// Split text into lines without their terminators.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_terminator('\n').map(str::to_owned).collect()
}

/// Maps line numbers to byte offsets.
#[derive(Debug)]
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (index, byte) in text.bytes().enumerate() {
            if byte == b'\n' && index + 1 < text.len() {
                line_starts.push(index + 1);
            }
        }

        Self { text, line_starts }
    }

    pub(crate) fn line_count(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            self.line_starts.len()
        }
    }

    /// Byte offset where `line` starts; `line_count()` maps to the end.
    pub(crate) fn offset(&self, line: usize) -> Option<usize> {
        match line.cmp(&self.line_count()) {
            std::cmp::Ordering::Less => self.line_starts.get(line).copied(),
            std::cmp::Ordering::Equal => Some(self.text.len()),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Whether the last line lacks a terminating newline.
    pub(crate) fn has_open_tail(&self) -> bool {
        !self.text.is_empty() && !self.text.ends_with('\n')
    }
}
