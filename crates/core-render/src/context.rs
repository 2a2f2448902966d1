//! Per-line render context: the state threaded through every producer.
//!
//! [`LineContext`] is created fresh for each logical line, lives across
//! all the physical rows that line occupies, and is dropped when the
//! last row is committed. [`Phase`] only moves forward within a physical
//! row, with two documented exceptions: a gutter producer that emits
//! more than one run re-enters its own phase via [`Phase::prev`], and
//! every new physical row resets to [`Phase::Start`].

use crate::attr::Attr;
use core_text::{egc_width, grapheme};

/// Draw phases of one physical row, in strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Nothing produced yet.
    Start,
    /// Command-line window prompt column.
    Cmdline,
    /// Fold indicator column.
    FoldColumn,
    /// Sign column (may re-enter once per configured segment).
    SignColumn,
    /// Line number column.
    LineNumber,
    /// User status column (may re-enter once per highlight section).
    StatusColumn,
    /// Break-indent blanks on continuation rows.
    BreakIndent,
    /// Show-break marker, or filler-row content.
    ShowBreak,
    /// Buffer text.
    Body,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Start => Phase::Cmdline,
            Phase::Cmdline => Phase::FoldColumn,
            Phase::FoldColumn => Phase::SignColumn,
            Phase::SignColumn => Phase::LineNumber,
            Phase::LineNumber => Phase::StatusColumn,
            Phase::StatusColumn => Phase::BreakIndent,
            Phase::BreakIndent => Phase::ShowBreak,
            Phase::ShowBreak | Phase::Body => Phase::Body,
        }
    }

    /// Re-entry point for producers that emit several runs in sequence.
    pub fn prev(self) -> Phase {
        match self {
            Phase::Start | Phase::Cmdline => Phase::Start,
            Phase::FoldColumn => Phase::Cmdline,
            Phase::SignColumn => Phase::FoldColumn,
            Phase::LineNumber => Phase::SignColumn,
            Phase::StatusColumn => Phase::LineNumber,
            Phase::BreakIndent => Phase::StatusColumn,
            Phase::ShowBreak => Phase::BreakIndent,
            Phase::Body => Phase::ShowBreak,
        }
    }
}

/// A synthetic run of display units: gutter text, tab expansion, escape
/// forms, show-break, fold text. Either `text` streams grapheme by
/// grapheme, or `fill` repeats one char; `terminal` (when set) replaces
/// the very last unit of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRun {
    /// Display units still to emit.
    pub remaining: usize,
    text: Option<String>,
    text_pos: usize,
    fill: Option<char>,
    terminal: Option<char>,
    /// Fixed attr for the whole run; `None` resolves per cell through
    /// the normal body pipeline.
    pub attr: Option<Attr>,
}

impl PendingRun {
    /// A run of `n` copies of `fill`.
    pub fn filled(n: usize, fill: char, attr: Option<Attr>) -> Self {
        Self {
            remaining: n,
            text: None,
            text_pos: 0,
            fill: Some(fill),
            terminal: None,
            attr,
        }
    }

    /// A run of `n` copies of `fill` whose last unit is `terminal`.
    pub fn filled_until(n: usize, fill: char, terminal: char, attr: Option<Attr>) -> Self {
        Self {
            terminal: Some(terminal),
            ..Self::filled(n, fill, attr)
        }
    }

    /// A run streaming `text` one grapheme cluster at a time.
    pub fn text(text: String, attr: Option<Attr>) -> Self {
        let remaining = grapheme::iter(&text).count();
        Self {
            remaining,
            text: Some(text),
            text_pos: 0,
            fill: None,
            terminal: None,
            attr,
        }
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Next display unit without consuming it: `(cluster, width)`.
    pub fn peek(&self) -> (String, usize) {
        if let Some(text) = &self.text {
            let rest = &text[self.text_pos..];
            if let Some(g) = grapheme::iter(rest).next() {
                return (g.to_string(), grapheme::cluster_width(g).max(1));
            }
            // Run longer than its text: pad with blanks.
            return (" ".to_string(), 1);
        }
        let c = match self.terminal {
            Some(t) if self.remaining == 1 => t,
            _ => self.fill.unwrap_or(' '),
        };
        (c.to_string(), (egc_width(&c.to_string()) as usize).max(1))
    }

    pub fn consume(&mut self) {
        if let Some(text) = &self.text {
            let rest = &text[self.text_pos..];
            if let Some(g) = grapheme::iter(rest).next() {
                self.text_pos += g.len();
            }
        }
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// A decoded wide cluster that did not fit before the right edge; it is
/// consumed as the first body unit of the next physical row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCluster {
    pub cluster: String,
    pub width: usize,
}

/// All state carried across one logical line's physical rows.
#[derive(Debug)]
pub struct LineContext {
    pub phase: Phase,
    /// Logical line index.
    pub row: usize,
    /// First physical row of this line.
    pub start_row: usize,
    /// Physical row currently being filled.
    pub screen_row: usize,

    /// Virtual column: position in tab/width-expanded space.
    pub vcol: usize,
    /// Virtual columns consumed by concealed text on this row.
    pub vcol_off: usize,
    /// Nonexistent cells added to the writer position so wrap geometry
    /// stays correct while concealing.
    pub boguscols: usize,

    pub pending: Option<PendingRun>,
    /// Run snapshot taken at a row boundary, restored when the next
    /// row reaches the body phase.
    pub saved: Option<PendingRun>,
    pub saved_attr: Attr,

    /// Attr for the next character, as resolved so far.
    pub char_attr: Attr,
    pub line_attr: Option<Attr>,
    pub line_attr_low: Option<Attr>,
    pub cul_attr: Option<Attr>,

    /// Selection/search inversion bounds in virtual columns.
    pub from_vcol: Option<usize>,
    pub to_vcol: usize,

    /// Virtual column just past the show-break marker, used to avoid
    /// double-charging tab width right after it.
    pub vcol_sbr: Option<usize>,
    pub need_showbreak: bool,

    /// Filler rows (diff padding + virtual lines) still to emit.
    pub filler_rows: usize,
    pub filler_todo: usize,
    pub n_virt_rows: usize,

    pub deferred: Option<DeferredCluster>,

    /// Cells left of the window to skip (horizontal scroll).
    pub n_skip: usize,
    /// Byte cursor into the line text.
    pub byte: usize,

    /// End-of-line listchar (or synthesized highlight cell) not yet used.
    pub eol_todo: bool,
    pub prec_todo: bool,

    pub sign_idx: usize,
    /// Cells consumed by gutters on the current row.
    pub gutter_width: usize,

    /// Attr override span for escape forms and list markers: applied on
    /// top for `extra_cells` units, then `saved_after` is restored.
    pub extra_cells: usize,
    pub extra_attr: Attr,
    pub saved_after: Attr,

    /// Separate one-cell override for the 'precedes' marker, which
    /// overrules even selection highlighting.
    pub prec_cells: usize,
    pub prec_saved: Attr,

    /// Position in the cycling 'multispace' marker sequence.
    pub multispace_pos: usize,

    /// Previous base character, for Arabic shaping context.
    pub prev_base: Option<char>,
    /// Conceal bookkeeping: token of the concealed item currently being
    /// skipped, so one substitute char is drawn per item.
    pub conceal_item: Option<u64>,
    pub is_concealing: bool,
}

impl LineContext {
    pub fn new(row: usize, start_row: usize) -> Self {
        Self {
            phase: Phase::Start,
            row,
            start_row,
            screen_row: start_row,
            vcol: 0,
            vcol_off: 0,
            boguscols: 0,
            pending: None,
            saved: None,
            saved_attr: Attr::EMPTY,
            char_attr: Attr::EMPTY,
            line_attr: None,
            line_attr_low: None,
            cul_attr: None,
            from_vcol: None,
            to_vcol: usize::MAX,
            vcol_sbr: None,
            need_showbreak: false,
            filler_rows: 0,
            filler_todo: 0,
            n_virt_rows: 0,
            deferred: None,
            n_skip: 0,
            byte: 0,
            eol_todo: true,
            prec_todo: false,
            sign_idx: 0,
            gutter_width: 0,
            extra_cells: 0,
            extra_attr: Attr::EMPTY,
            saved_after: Attr::EMPTY,
            prec_cells: 0,
            prec_saved: Attr::EMPTY,
            multispace_pos: 0,
            prev_base: None,
            conceal_item: None,
            is_concealing: false,
        }
    }

    /// Reset for a new physical row. Saves the interrupted run so the
    /// body phase of the new row can continue it.
    pub fn start_row(&mut self, save_run: bool) {
        self.phase = Phase::Start;
        self.sign_idx = 0;
        if save_run {
            self.saved = self.pending.take();
            self.saved_attr = self.char_attr;
        }
        self.gutter_width = 0;
        self.boguscols = 0;
        self.vcol_off = 0;
    }

    /// Called when the body phase starts: restore a run saved at the
    /// previous row boundary.
    pub fn continue_body(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.pending = Some(saved);
            self.char_attr = self.saved_attr;
        } else {
            self.char_attr = Attr::EMPTY;
        }
    }

    /// Tab alignment must be identical regardless of concealment: the
    /// expanded tab absorbs the columns concealment skipped, and the
    /// writer position drops its bogus cells. Returns the number of
    /// virtual columns folded back into the pending tab run.
    pub fn reconcile_conceal(&mut self) -> usize {
        let off = self.vcol_off;
        self.vcol -= off;
        self.vcol_off = 0;
        self.boguscols = 0;
        off
    }
}
