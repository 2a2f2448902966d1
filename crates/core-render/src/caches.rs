//! Explicit per-window caches.
//!
//! These used to be function-local statics in the original design;
//! keeping them on a [`RenderState`] value owned by the caller makes the
//! keying explicit and leaves the renderer free of global state, so a
//! future multi-window renderer can hold one state per window.
//! Invalidation is by key mismatch, never by schedule.

/// Cursor-line "screenline" margins: the virtual-column interval of the
/// physical row the cursor sits on, cached per (window, cursor vcol,
/// gutter width).
#[derive(Debug, Default)]
pub struct MarginCache {
    key: Option<(u64, usize, usize)>,
    left: usize,
    right: usize,
}

impl MarginCache {
    /// Margins of the screen row containing `cursor_vcol`, for a window
    /// `grid_width` wide with `col_off` gutter cells.
    pub fn margins(
        &mut self,
        win: u64,
        cursor_vcol: usize,
        col_off: usize,
        grid_width: usize,
    ) -> (usize, usize) {
        let key = (win, cursor_vcol, col_off);
        if self.key == Some(key) {
            return (self.left, self.right);
        }
        let width1 = grid_width.saturating_sub(col_off).max(1);
        // Continuation rows have the same text width here (gutters are
        // re-drawn on every row), so the interval is a plain division.
        let (left, right) = if cursor_vcol < width1 {
            (0, width1)
        } else {
            let row = (cursor_vcol - width1) / width1 + 1;
            (width1 + (row - 1) * width1, width1 + row * width1)
        };
        self.key = Some(key);
        self.left = left;
        self.right = right;
        (left, right)
    }
}

/// Cross-line spell state: a word that wrapped across a line break has
/// already been checked up to some column of the next line.
#[derive(Debug, Default)]
pub struct SpellMemo {
    /// Line whose prefix was already cleared by the previous line's
    /// last word, and the column up to which it was cleared.
    pub checked_row: Option<usize>,
    pub checked_col: usize,
    /// Line whose first word must start with a capital (previous line
    /// ended a sentence), and the column where that word starts.
    pub cap_row: Option<usize>,
    pub cap_col: usize,
}

/// Status column bookkeeping across lines: the width the column was
/// last built with and the buffer line count that width was based on.
#[derive(Debug, Default)]
pub struct StatusColMemo {
    pub line_count: usize,
    pub width: usize,
}

/// All cross-line state one window's renderer keeps between
/// `render_line` calls.
#[derive(Debug, Default)]
pub struct RenderState {
    /// Identity of the window this state belongs to; part of every
    /// cache key.
    pub win_id: u64,
    pub margins: MarginCache,
    pub spell: SpellMemo,
    pub status_col: StatusColMemo,
}

impl RenderState {
    pub fn new(win_id: u64) -> Self {
        Self {
            win_id,
            ..Self::default()
        }
    }
}
