//! Grapheme cluster display width engine.
//!
//! `egc_width` is the one function allowed to decide how many terminal
//! columns a cluster occupies; no other crate calls `unicode_width`
//! directly. The baseline crate mis-measures several composed sequences
//! (ZWJ emoji, flags, keycaps, tone modifiers), so the lookup order is:
//!
//! 1. Static override table (exact sequence match, sorted, binary search).
//! 2. Heuristic classifier mapping the cluster to a semantic kind.
//! 3. Conservative widen fallback when a pictographic signal is present
//!    but the computed width is still 1.
//!
//! The classifier over-estimates on purpose: an extra blank cell is
//! harmless, an under-estimate makes every following column drift.

const ZWJ: char = '\u{200D}';
const KEYCAP_COMBINING: char = '\u{20E3}';

/// Exact-sequence overrides for clusters the classifier cannot decide
/// structurally. Must stay sorted by the sequence string (byte order).
static OVERRIDES: &[(&str, u16)] = &[
    ("#\u{FE0F}\u{20E3}", 2),
    ("*\u{FE0F}\u{20E3}", 2),
    ("1\u{FE0F}\u{20E3}", 2),
    ("\u{2139}\u{FE0F}", 1),
    ("\u{2764}\u{FE0F}\u{200D}\u{1F525}", 2),
    ("\u{1F1FA}\u{1F1F8}", 2),
    ("\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}", 2),
];

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

// Rough Extended Pictographic check: the primary emoji planes plus the
// Misc Symbols / Dingbats ranges where legacy emoji live.
fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn override_width(egc: &str) -> Option<u16> {
    OVERRIDES
        .binary_search_by(|(seq, _)| (*seq).cmp(egc))
        .ok()
        .map(|i| OVERRIDES[i].1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClusterKind {
    Narrow,
    Wide,
    Emoji,
    Combining { wide_base: bool },
}

fn classify(egc: &str) -> ClusterKind {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return ClusterKind::Narrow;
    };
    let single = chars.next().is_none();

    if single {
        if first.is_ascii() {
            return ClusterKind::Narrow;
        }
        if is_extended_pictographic(first) {
            return ClusterKind::Emoji;
        }
        return match unicode_width::UnicodeWidthChar::width(first).unwrap_or(1) {
            2 => ClusterKind::Wide,
            _ => ClusterKind::Narrow,
        };
    }

    let count = egc.chars().count();
    let mut pictographic = 0usize;
    let mut regional = 0usize;
    let mut has_zwj = false;
    let mut has_skin = false;
    let mut has_combining = false;
    let mut ends_with_keycap = false;
    let mut any_wide = false;
    let mut base_wide = false;
    let mut saw_base = false;

    for (i, c) in egc.chars().enumerate() {
        if is_extended_pictographic(c) {
            pictographic += 1;
        }
        if is_regional_indicator(c) {
            regional += 1;
        }
        has_zwj |= c == ZWJ;
        has_skin |= is_skin_tone_modifier(c);
        let combining = unicode_normalization::char::is_combining_mark(c);
        has_combining |= combining;
        if c == KEYCAP_COMBINING && i == count - 1 {
            ends_with_keycap = true;
        }
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(1);
        any_wide |= w == 2;
        if !saw_base && !combining {
            saw_base = true;
            base_wide = is_extended_pictographic(c) || w == 2;
        }
    }

    if ends_with_keycap
        || (regional == 2 && count == 2)
        || (has_zwj && pictographic >= 2)
        || (pictographic >= 1 && has_skin)
        || (pictographic == 1 && !has_zwj)
    {
        return ClusterKind::Emoji;
    }
    if has_combining {
        return ClusterKind::Combining { wide_base: base_wide };
    }
    if any_wide || pictographic > 0 {
        return ClusterKind::Wide;
    }
    ClusterKind::Narrow
}

/// Display column width of a single grapheme cluster.
///
/// Precondition: `egc` is one grapheme cluster; callers segment first and
/// this function does not re-validate.
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    if let Some(w) = override_width(egc) {
        return w;
    }
    let width = match classify(egc) {
        ClusterKind::Narrow => 1,
        ClusterKind::Wide | ClusterKind::Emoji => 2,
        ClusterKind::Combining { wide_base } => {
            if wide_base {
                2
            } else {
                1
            }
        }
    };
    if width == 1
        && egc
            .chars()
            .any(|c| is_extended_pictographic(c) || is_regional_indicator(c))
    {
        // Pictographic signal but narrow result: widen rather than drift.
        return 2;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(egc_width("a"), 1);
    }

    #[test]
    fn wide_cjk() {
        assert_eq!(egc_width("界"), 2);
    }

    #[test]
    fn emoji_basic() {
        assert_eq!(egc_width("😀"), 2);
    }

    #[test]
    fn combining_acute() {
        assert_eq!(egc_width("e\u{0301}"), 1);
    }

    #[test]
    fn wide_base_with_combining_mark() {
        assert_eq!(egc_width("界\u{0301}"), 2);
    }

    #[test]
    fn emoji_flag_pair() {
        assert_eq!(egc_width("🇺🇸"), 2);
    }

    #[test]
    fn emoji_keycap() {
        assert_eq!(egc_width("1️⃣"), 2);
    }

    #[test]
    fn emoji_zwj_family() {
        assert_eq!(egc_width("👨‍👩‍👧‍👦"), 2);
    }

    #[test]
    fn emoji_skin_tone() {
        assert_eq!(egc_width("👍🏻"), 2);
    }

    #[test]
    fn lone_regional_indicator_widens() {
        assert_eq!(egc_width("🇺"), 2);
    }

    #[test]
    fn keycap_without_vs16() {
        assert_eq!(egc_width("2\u{20E3}"), 2);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(egc_width(""), 0);
    }

    #[test]
    fn override_table_sorted_and_consistent() {
        for pair in OVERRIDES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "override table out of order");
        }
        for (seq, w) in OVERRIDES {
            assert_eq!(egc_width(seq), *w, "override mismatch for {seq}");
        }
    }
}
