//! Normalization + segmentation adapter.
//!
//! Pre-built strings that the renderer streams out cell by cell (status
//! column text, fold text, virtual text chunks) go through here once:
//! NFC-normalize, then segment into grapheme clusters with byte ranges
//! and display widths. Clusters are in order, non-overlapping, and cover
//! the whole normalized string.

use crate::egc_width;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub cluster: String,
    /// Byte offset into the normalized string (inclusive).
    pub start: usize,
    /// Byte offset into the normalized string (exclusive).
    pub end: usize,
    /// Terminal cell width, after width overrides.
    pub width: u16,
}

/// Normalize to NFC and segment into grapheme clusters.
pub fn normalize_and_segment(input: &str) -> (String, Vec<Segment>) {
    let normalized: String = input.nfc().collect();
    let mut out = Vec::new();
    let mut byte = 0usize;
    for g in normalized.graphemes(true) {
        out.push(Segment {
            cluster: g.to_string(),
            start: byte,
            end: byte + g.len(),
            width: egc_width(g),
        });
        byte += g.len();
    }
    (normalized, out)
}
