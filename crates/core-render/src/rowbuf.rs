//! Cell writer: one physical row being assembled.
//!
//! Units arrive in production order (gutters first, then text). For
//! left-to-right rows they are placed left to right; for right-to-left
//! rows the writer mirrors placement, starting at the rightmost cell and
//! walking left. A wide cluster's lead cell is always the leftmost of
//! the pair it occupies, in both directions, and the other cell is
//! tagged as a zero-width continuation so the grid layer never treats it
//! as an independent cell.
//!
//! Concealment can advance the position without writing ("bogus"
//! cells): they count toward row fullness so wrap geometry matches what
//! the text would have occupied unconcealed, but the next real cell is
//! still written right after the previous one.

use crate::Cell;
use crate::attr::Attr;

#[derive(Debug)]
pub struct RowBuffer {
    cells: Vec<Cell>,
    width: usize,
    rl: bool,
    /// Cells actually written.
    written: usize,
    /// Nonexistent cells advanced over while concealing.
    bogus: usize,
}

impl RowBuffer {
    pub fn new(width: usize, rl: bool) -> Self {
        Self {
            cells: vec![Cell::blank(Attr::EMPTY); width],
            width,
            rl,
            written: 0,
            bogus: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Position in wrap geometry: written plus bogus cells.
    pub fn used(&self) -> usize {
        self.written + self.bogus
    }

    pub fn remaining(&self) -> usize {
        self.width.saturating_sub(self.used())
    }

    pub fn is_full(&self) -> bool {
        self.used() >= self.width
    }

    /// Place one display unit at the next write position.
    pub fn put(&mut self, cluster: &str, width: usize, attr: Attr) {
        if self.written >= self.width {
            return;
        }
        let w = width.max(1).min(self.width - self.written);
        let start = if self.rl {
            self.width - self.written - w
        } else {
            self.written
        };
        self.cells[start] = Cell::leader(cluster, w, attr);
        for i in 1..w {
            self.cells[start + i] = Cell::continuation(attr);
        }
        self.written += w;
    }

    /// Advance the wrap position without writing (concealed columns).
    pub fn advance_bogus(&mut self, n: usize) {
        self.bogus += n;
    }

    /// Give back bogus cells (tab reconciliation, end of line).
    pub fn unbogus(&mut self, n: usize) {
        self.bogus = self.bogus.saturating_sub(n);
    }

    /// Blank-fill the rest of the row with `attr`.
    pub fn fill_rest(&mut self, ch: char, attr: Attr) {
        let s = ch.to_string();
        while !self.is_full() {
            self.put(&s, 1, attr);
        }
    }

    /// Synthesized end-of-line highlight: add one blank cell, or when
    /// already at the edge re-attr the boundary cell instead.
    pub fn put_eol_highlight(&mut self, attr: Attr) {
        if !self.is_full() {
            self.put(" ", 1, attr);
            return;
        }
        let idx = if self.rl { 0 } else { self.width - 1 };
        if let Some(cell) = self.cells.get_mut(idx) {
            cell.attr = attr;
        }
    }

    pub fn attr_at(&self, col: usize) -> Attr {
        self.cells.get(col).map(|c| c.attr).unwrap_or(Attr::EMPTY)
    }

    /// Overwrite cells at an absolute column (virtual text). Splitting a
    /// wide cluster blanks its other half so the grid stays consistent.
    pub fn overlay(&mut self, col: usize, cluster: &str, width: usize, attr: Attr) {
        if col >= self.width {
            return;
        }
        let w = width.max(1).min(self.width - col);
        // Writing into the middle of a wide cluster: blank its leader.
        if !self.cells[col].is_leader() {
            let mut lead = col;
            while lead > 0 && !self.cells[lead].is_leader() {
                lead -= 1;
            }
            let lead_attr = self.cells[lead].attr;
            for c in &mut self.cells[lead..col] {
                *c = Cell::blank(lead_attr);
            }
        }
        // Overwriting the left half of a wide cluster: blank the rest.
        let old_w = self.cells[col].width as usize;
        if old_w > w {
            for c in &mut self.cells[col + w..col + old_w] {
                *c = Cell::blank(attr);
            }
        }
        self.cells[col] = Cell::leader(cluster, w, attr);
        for i in 1..w {
            self.cells[col + i] = Cell::continuation(attr);
        }
        // A continuation left over from a longer previous cluster.
        if col + w < self.width && !self.cells[col + w].is_leader() {
            let a = self.cells[col + w].attr;
            self.cells[col + w] = Cell::blank(a);
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}
