//! Line-to-rows rendering: the middle layer of the display pipeline.
//!
//! One call to [`render_line`] converts a single logical buffer line plus
//! its per-line decoration state into one or more fixed-width rows of
//! [`Cell`]s and hands each finished row to the caller's grid sink. The
//! work is a strict per-cell sequence driven by an ordered phase machine:
//!
//! 1. Gutter producers (command-line prompt, fold indicator, signs, line
//!    number, status column) each fill a synthetic run.
//! 2. Break-indent / show-break producers decorate wrapped rows.
//! 3. The character source yields exactly one display unit: from the
//!    active synthetic run, from the deferred wide cluster left over by
//!    the previous row, or by decoding the next grapheme (UTF-8 with
//!    illegal-byte escapes, composing accumulation, Arabic shaping, tab
//!    expansion, list-mode markers, non-printable escape forms).
//! 4. The highlight resolver layers selection, search, line, syntax,
//!    spell, decoration, and conceal attrs into one [`Attr`].
//! 5. The cell writer places the unit, mirrored for right-to-left rows.
//! 6. The controller commits full rows and either stops or re-runs the
//!    gutters for a continuation row.
//!
//! Invariants:
//! - A leader cell has `width >= 1` and a non-empty cluster; continuation
//!   cells have `width == 0`, an empty cluster, and the leader's attr.
//! - Exactly one source is active per unit: pending run, deferred
//!   cluster, or buffer decode.
//! - Committed rows always contain exactly `grid_width` cells, already
//!   ordered for the window's text direction.
//! - Collaborator failures degrade one feature for the remainder of the
//!   current line, or abort the current line's remaining rows; rows
//!   already committed are never touched again.

pub mod attr;
pub mod caches;
pub mod context;
pub mod gutter;
pub mod indent;
pub mod line_engine;
pub mod providers;
pub mod resolver;
pub mod rowbuf;
pub mod source;

pub use attr::{Attr, AttrFlags, Color, HlGroup, Theme};
pub use caches::RenderState;
pub use line_engine::{
    DiffContext, DiffKind, DrawnLine, LineOutcome, LineParams, MatchSpan, Selection, render_line,
};
pub use providers::{Collaborators, GridSink};

/// One grid position: a grapheme cluster (empty for the continuation
/// half of a wide cluster) and its resolved attr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub cluster: String,
    /// Visual width in columns; `0` marks a continuation cell.
    pub width: u8,
    pub attr: Attr,
}

impl Cell {
    pub fn leader(cluster: &str, width: usize, attr: Attr) -> Self {
        Self {
            cluster: cluster.to_string(),
            width: width.max(1) as u8,
            attr,
        }
    }

    pub fn continuation(attr: Attr) -> Self {
        Self {
            cluster: String::new(),
            width: 0,
            attr,
        }
    }

    pub fn blank(attr: Attr) -> Self {
        Self::leader(" ", 1, attr)
    }

    pub fn is_leader(&self) -> bool {
        self.width > 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Attr::EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_width_floor_is_one() {
        let c = Cell::leader("a", 0, Attr::EMPTY);
        assert_eq!(c.width, 1);
        assert!(c.is_leader());
    }

    #[test]
    fn continuation_is_not_leader() {
        let c = Cell::continuation(Attr::EMPTY);
        assert!(!c.is_leader());
        assert!(c.cluster.is_empty());
    }
}
