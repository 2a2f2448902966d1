//! Text access and Unicode helpers for the display pipeline.
//!
//! The renderer consumes one logical line at a time; this crate supplies
//! everything it needs to take a line apart: grapheme boundaries, display
//! widths (`egc_width` is the single authority), raw-byte UTF-8 decoding
//! that surfaces illegal bytes instead of hiding them, Arabic contextual
//! shaping, and a thin read-only rope buffer the driving layer uses to
//! hand lines (plus the spell look-ahead line) to the renderer.

use ropey::Rope;

pub mod arabic;
pub mod segment;
pub mod utf8;
pub mod width;

// Re-export the primary width function for callers that already depend on
// core-text.
pub use width::egc_width;

/// A read-only text buffer backed by a `ropey::Rope`.
///
/// The display pipeline never edits text; it only needs per-line access for
/// the line being drawn and the following line (spell checking looks ahead
/// across the line break).
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice.
    pub fn from_str(name: impl Into<String>, content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            name: name.into(),
        }
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Line content without its trailing newline.
    pub fn line_content(&self, idx: usize) -> Option<String> {
        if idx >= self.rope.len_lines() {
            return None;
        }
        let mut s = self.rope.line(idx).to_string();
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Some(s)
    }

    /// Byte length of a line excluding any newline.
    pub fn line_byte_len(&self, idx: usize) -> usize {
        self.line_content(idx).map_or(0, |s| s.len())
    }
}

/// Grapheme cluster helpers operating on a single line.
pub mod grapheme {
    use crate::egc_width;
    use unicode_segmentation::UnicodeSegmentation;

    /// Iterate grapheme clusters in a line.
    pub fn iter(line: &str) -> impl Iterator<Item = &str> {
        line.graphemes(true)
    }

    /// Next grapheme boundary (returns `line.len()` if at or beyond end).
    pub fn next_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        line.len()
    }

    /// Previous grapheme boundary (returns 0 at or below the first one).
    pub fn prev_boundary(line: &str, byte: usize) -> usize {
        if byte == 0 || byte > line.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Visual column (terminal cells) up to, but not including, `byte`.
    /// Tabs are not expanded here; the renderer owns tab-stop arithmetic.
    pub fn visual_col(line: &str, byte: usize) -> usize {
        let mut col = 0;
        for (idx, g) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            col += egc_width(g) as usize;
        }
        col
    }

    /// Width in terminal cells of one grapheme cluster.
    pub fn cluster_width(g: &str) -> usize {
        egc_width(g) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_line_access() {
        let b = Buffer::from_str("t", "hello\nworld");
        assert_eq!(b.line_count(), 2);
        assert_eq!(b.line_content(0).unwrap(), "hello");
        assert_eq!(b.line_content(1).unwrap(), "world");
        assert_eq!(b.line_content(2), None);
    }

    #[test]
    fn buffer_strips_crlf() {
        let b = Buffer::from_str("t", "a\r\nb");
        assert_eq!(b.line_content(0).unwrap(), "a");
        assert_eq!(b.line_byte_len(0), 1);
    }

    #[test]
    fn boundaries_roundtrip() {
        let s = "a😀b";
        let after_a = grapheme::next_boundary(s, 0);
        let after_emoji = grapheme::next_boundary(s, after_a);
        assert_eq!(grapheme::prev_boundary(s, after_emoji), after_a);
        assert_eq!(grapheme::prev_boundary(s, after_a), 0);
    }

    #[test]
    fn combining_mark_is_one_cluster() {
        let s = "e\u{0301}x";
        let nb = grapheme::next_boundary(s, 0);
        assert_eq!(nb, "e\u{0301}".len());
        assert_eq!(grapheme::visual_col(s, nb), 1);
    }

    #[test]
    fn visual_col_counts_wide() {
        let s = "a漢b";
        assert_eq!(grapheme::visual_col(s, s.len()), 4);
    }
}
