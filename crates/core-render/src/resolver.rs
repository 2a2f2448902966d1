//! Highlight resolution: one attr per cell from up to nine sources.
//!
//! The precedence is fixed and documented here as data, not scattered
//! control flow. Highest first:
//!
//! 1. selection / incremental-search span (with live search combined
//!    underneath it when present)
//! 2. live search / match highlight
//! 3. whole-line attr (diff, quickfix, foreground-defining cursorline)
//!    when the column is outside the active selection span
//! 4. syntax, combined with cursorline as low or high priority
//!    depending on whether the cursorline attr defines a foreground
//! 5. spelling
//! 6. decoration (extmark)
//! 7. terminal-buffer per-column attr, combined underneath
//!
//! When one of rules 1-3 forms the base, the cell has "priority": the
//! secondary layers 4-6 then combine *under* it instead of over it.
//! Concealment, the one-shot escape-form override, and the low-priority
//! line attr are applied by the engine at store time because they need
//! run state; their placement is documented in `line_engine`.

use crate::attr::Attr;

/// Everything known about one cell's highlight sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttrInputs {
    /// Selection / incsearch attr, when the span is active at this cell.
    pub area: Option<Attr>,
    /// Search / match attr covering this cell.
    pub search: Option<Attr>,
    /// Whole-line attr (diff, quickfix, high-priority cursorline).
    pub line: Option<Attr>,
    /// Cursorline attr, for the syntax combination rule.
    pub cul: Option<Attr>,
    /// Cursorline is in low-priority mode (no foreground defined).
    pub cul_low: bool,
    pub syntax: Option<Attr>,
    pub spell: Option<Attr>,
    pub decor: Option<Attr>,
    /// Terminal-buffer attr for this column.
    pub term: Option<Attr>,
    /// The column lies outside the active selection span (gates rule 3).
    pub outside_area: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAttr {
    pub attr: Attr,
    /// A priority base (rules 1-3) won; secondary layers went under it.
    pub priority: bool,
}

/// Secondary layers combined in order after the base is chosen. Each
/// goes over a non-priority base and under a priority one.
const SECONDARY: &[fn(&AttrInputs) -> Option<Attr>] = &[
    |i| i.spell,  // rule 5
    |i| i.decor,  // rule 6
];

pub fn resolve(i: &AttrInputs) -> ResolvedAttr {
    let mut priority = true;
    let mut attr = if let Some(area) = i.area {
        // Rule 1; live search shows through the selection when possible.
        let base = Attr::combine_opt(i.line, area);
        match i.search {
            Some(search) => Attr::combine(search, base),
            None => base,
        }
    } else if let Some(search) = i.search {
        // Rule 2.
        Attr::combine_opt(i.line, search)
    } else if i.line.is_some() && i.outside_area {
        // Rule 3.
        i.line.unwrap_or(Attr::EMPTY)
    } else {
        // Rule 4 forms the base: syntax with the cursorline split.
        priority = false;
        match (i.syntax, i.cul) {
            (Some(syn), Some(cul)) => {
                if i.cul_low {
                    Attr::combine(cul, syn)
                } else {
                    Attr::combine(syn, cul)
                }
            }
            (Some(syn), None) => syn,
            (None, _) => Attr::EMPTY,
        }
    };

    if priority {
        // Syntax still contributes underneath a priority base.
        if let Some(syn) = i.syntax {
            attr = Attr::combine(syn, attr);
        }
    }
    for layer in SECONDARY {
        if let Some(l) = layer(i) {
            attr = if priority {
                Attr::combine(l, attr)
            } else {
                Attr::combine(attr, l)
            };
        }
    }
    // Rule 7: terminal attrs underneath everything resolved so far.
    if let Some(term) = i.term {
        attr = Attr::combine(term, attr);
    }
    ResolvedAttr { attr, priority }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::style::Color;

    fn fg(c: Color) -> Attr {
        Attr::fg(c)
    }

    #[test]
    fn selection_beats_syntax() {
        let r = resolve(&AttrInputs {
            area: Some(fg(Color::Blue)),
            syntax: Some(fg(Color::Red)),
            ..Default::default()
        });
        assert!(r.priority);
        assert_eq!(r.attr.fg, Some(Color::Blue));
    }

    #[test]
    fn search_shows_under_selection() {
        let r = resolve(&AttrInputs {
            area: Some(Attr::bg(Color::Grey)),
            search: Some(fg(Color::Yellow)),
            ..Default::default()
        });
        // Selection defines no fg, so the search fg survives.
        assert_eq!(r.attr.fg, Some(Color::Yellow));
        assert_eq!(r.attr.bg, Some(Color::Grey));
    }

    #[test]
    fn search_beats_line_attr() {
        let r = resolve(&AttrInputs {
            search: Some(fg(Color::Yellow)),
            line: Some(fg(Color::Red)),
            ..Default::default()
        });
        assert_eq!(r.attr.fg, Some(Color::Yellow));
    }

    #[test]
    fn line_attr_needs_outside_area() {
        let inside = resolve(&AttrInputs {
            line: Some(fg(Color::Red)),
            syntax: Some(fg(Color::Green)),
            outside_area: false,
            ..Default::default()
        });
        assert!(!inside.priority);
        assert_eq!(inside.attr.fg, Some(Color::Green));
        let outside = resolve(&AttrInputs {
            line: Some(fg(Color::Red)),
            syntax: Some(fg(Color::Green)),
            outside_area: true,
            ..Default::default()
        });
        assert!(outside.priority);
        assert_eq!(outside.attr.fg, Some(Color::Red));
    }

    #[test]
    fn cursorline_split_by_foreground() {
        // Background-only cursorline: syntax wins the fg.
        let low = resolve(&AttrInputs {
            syntax: Some(fg(Color::Green)),
            cul: Some(Attr::bg(Color::Grey)),
            cul_low: true,
            ..Default::default()
        });
        assert_eq!(low.attr.fg, Some(Color::Green));
        assert_eq!(low.attr.bg, Some(Color::Grey));
        // Foreground-defining cursorline wins over syntax.
        let high = resolve(&AttrInputs {
            syntax: Some(fg(Color::Green)),
            cul: Some(fg(Color::White)),
            cul_low: false,
            ..Default::default()
        });
        assert_eq!(high.attr.fg, Some(Color::White));
    }

    #[test]
    fn spell_over_syntax_under_selection() {
        let plain = resolve(&AttrInputs {
            syntax: Some(fg(Color::Green)),
            spell: Some(fg(Color::Red)),
            ..Default::default()
        });
        assert_eq!(plain.attr.fg, Some(Color::Red));
        let selected = resolve(&AttrInputs {
            area: Some(fg(Color::Blue)),
            spell: Some(fg(Color::Red)),
            ..Default::default()
        });
        assert_eq!(selected.attr.fg, Some(Color::Blue));
    }

    #[test]
    fn terminal_attr_is_the_base_layer() {
        let r = resolve(&AttrInputs {
            term: Some(Attr::bg(Color::Black).with_flags(crate::AttrFlags::BOLD)),
            syntax: Some(fg(Color::Green)),
            ..Default::default()
        });
        assert_eq!(r.attr.fg, Some(Color::Green));
        assert_eq!(r.attr.bg, Some(Color::Black));
    }
}
