//! Row/wrap controller: drive one logical line through the phase
//! machine until every physical row is committed.
//!
//! The loop runs once per output cell. Each iteration advances the
//! gutter phases until a run is pending or the body phase is reached,
//! pulls exactly one display unit (pending run, deferred wide cluster,
//! or decoded grapheme), resolves its attr, stores it, and checks for
//! the row boundary. On a boundary with wrap enabled the run state is
//! snapshotted, the row committed, and the phases restart for the
//! continuation row; without wrap the remaining text is discarded.
//!
//! Failure handling: a syntax query error disables syntax for the rest
//! of the line; a status-column build error or reported truncation
//! aborts the line with a retry outcome; an interrupt between rows
//! stops row production. Rows already committed are never revisited.

use crate::attr::{Attr, HlGroup, Theme};
use crate::caches::RenderState;
use crate::context::{DeferredCluster, LineContext, Phase};
use crate::gutter::{self, NumberEnv, StatusColRun};
use crate::indent;
use crate::providers::{
    Collaborators, ConcealHint, DecorCell, FoldInfo, GridSink, SIGN_SHOW_MAX, SPELL_LOOKAHEAD,
    SignMark, SpellKind, SyntaxCell, VirtAnchor, VirtLine, VirtText,
};
use crate::resolver::{self, AttrInputs};
use crate::rowbuf::RowBuffer;
use crate::source::{self, BodyEnv, Step, Unit};
use anyhow::Result;
use core_config::DisplayOptions;
use core_text::{egc_width, segment, utf8};
use tracing::{debug, warn};

/// Selection / incremental-search span for this line, in virtual
/// columns. `to_vcol` is exclusive; `usize::MAX` reaches end of line.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub from_vcol: usize,
    pub to_vcol: usize,
    pub attr: Attr,
    /// Blockwise geometry: no end-of-line highlight cell.
    pub block: bool,
    /// Exclusive mode with the cursor at the boundary: the char under
    /// the cursor stays uninverted and highlighting restarts after it.
    pub noinvcur: bool,
    /// Cursor virtual column, for the `noinvcur` rules.
    pub cursor_vcol: usize,
}

/// A search/match highlight span in byte offsets of the line.
#[derive(Debug, Clone, Copy)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub attr: Attr,
    /// Match-defined conceal replacement char.
    pub conceal: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Add,
    Change,
}

/// Diff decoration for the line; `change_start..change_end` is the
/// changed-text byte range within a changed line.
#[derive(Debug, Clone, Copy)]
pub struct DiffContext {
    pub kind: DiffKind,
    pub change_start: usize,
    pub change_end: usize,
}

/// Everything the caller supplies to render one logical line.
pub struct LineParams<'a> {
    /// Line bytes without the trailing newline. Not guaranteed valid
    /// UTF-8.
    pub text: &'a [u8],
    /// Start of the following line, for spell look-ahead.
    pub next_line: Option<&'a str>,
    /// Logical line index (0-based).
    pub row: usize,
    /// First physical grid row to draw at.
    pub start_row: usize,
    /// First grid row past the allowed region.
    pub end_row: usize,
    pub grid_width: usize,
    /// Buffer line count (number column width, status column staleness).
    pub line_count: usize,
    pub cursor_row: usize,
    pub cursor_vcol: usize,
    /// Virtual columns scrolled out on the left: 'skipcol' when
    /// wrapping, left column otherwise.
    pub skip_cols: usize,
    pub selection: Option<Selection>,
    pub matches: &'a [MatchSpan],
    pub diff: Option<DiffContext>,
    /// Diff-padding rows above the line (virtual lines add their own).
    pub filler_rows: usize,
    pub quickfix_current: bool,
    /// Per-column attrs of an embedded terminal buffer.
    pub term_attrs: Option<&'a [Attr]>,
    /// Command-line window prompt char.
    pub cmdline_prompt: Option<char>,
    /// Conceal applies even though this is the cursor line.
    pub conceal_cursor: bool,
    /// Row past the end of the buffer: filler only, no text.
    pub end_fill: bool,
}

impl<'a> LineParams<'a> {
    pub fn new(text: &'a [u8], grid_width: usize) -> Self {
        Self {
            text,
            next_line: None,
            row: 0,
            start_row: 0,
            end_row: usize::MAX,
            grid_width,
            line_count: 1,
            cursor_row: usize::MAX,
            cursor_vcol: 0,
            skip_cols: 0,
            selection: None,
            matches: &[],
            diff: None,
            filler_rows: 0,
            quickfix_current: false,
            term_attrs: None,
            cmdline_prompt: None,
            conceal_cursor: false,
            end_fill: false,
        }
    }
}

/// Result of drawing one logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawnLine {
    /// Physical rows produced (and committed).
    pub rows: usize,
    /// An interrupt stopped row production early.
    pub interrupted: bool,
    /// Syntax highlighting was disabled mid-line after a query error.
    pub syntax_degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Drawn(DrawnLine),
    /// The status column reported truncation or failed: rebuild the
    /// column at `width` cells and render the line again.
    RetryStatusColumn { width: usize },
}

enum ConcealAction {
    Show,
    Substitute(char, Attr),
    Skip,
}

struct Walk<'w, 'c> {
    p: &'w LineParams<'w>,
    opts: &'w DisplayOptions,
    theme: &'w Theme,
    collab: &'w mut Collaborators<'c>,
    state: &'w mut RenderState,
    ctx: LineContext,
    rowbuf: RowBuffer,

    fold_info: FoldInfo,
    has_fold: bool,
    fold_text_done: bool,
    fold_fill_done: bool,
    signs: Vec<SignMark>,
    virt_lines: Vec<VirtLine>,
    virt_texts: Vec<VirtText>,
    has_decor: bool,

    syntax_on: bool,
    syntax_degraded: bool,
    cur_syntax: Option<SyntaxCell>,
    cur_decor: Option<DecorCell>,

    spell_on: bool,
    spell_src: String,
    word_end: usize,
    cur_checked_col: usize,
    spell_span: Option<(usize, usize, Attr)>,

    area_active: bool,
    from_prev: Option<usize>,
    vcol_prev: usize,
    search_attr: Option<Attr>,
    search_span: Option<MatchSpan>,

    cul_screenline: bool,
    cul_margins: (usize, usize),
    line_attr_saved: Option<Attr>,
    line_attr_low_saved: Option<Attr>,

    diff: Option<DiffContext>,
    diff_group: Option<HlGroup>,

    statuscol: Option<StatusColRun>,
    statuscol_width: usize,
    statuscol_retry: Option<usize>,

    lcs_eol: Option<char>,
    trail_start: usize,
    lead_end: usize,
    sbr_cells: usize,

    interrupted: bool,
}

/// Render one logical line into physical rows committed to `sink`.
pub fn render_line(
    params: &LineParams<'_>,
    opts: &DisplayOptions,
    theme: &Theme,
    collab: &mut Collaborators<'_>,
    state: &mut RenderState,
    sink: &mut dyn GridSink,
) -> Result<LineOutcome> {
    if params.start_row >= params.end_row || params.grid_width == 0 {
        return Ok(LineOutcome::Drawn(DrawnLine {
            rows: 0,
            interrupted: false,
            syntax_degraded: false,
        }));
    }
    let mut walk = Walk::new(params, opts, theme, collab, state);
    walk.prepare()?;
    if let Some(width) = walk.statuscol_retry {
        return Ok(LineOutcome::RetryStatusColumn { width });
    }
    walk.run(sink)
}

impl<'w, 'c> Walk<'w, 'c> {
    fn new(
        p: &'w LineParams<'w>,
        opts: &'w DisplayOptions,
        theme: &'w Theme,
        collab: &'w mut Collaborators<'c>,
        state: &'w mut RenderState,
    ) -> Self {
        let ctx = LineContext::new(p.row, p.start_row);
        let rowbuf = RowBuffer::new(p.grid_width, opts.rightleft);
        Self {
            p,
            opts,
            theme,
            collab,
            state,
            ctx,
            rowbuf,
            fold_info: FoldInfo::default(),
            has_fold: false,
            fold_text_done: false,
            fold_fill_done: false,
            signs: Vec::new(),
            virt_lines: Vec::new(),
            virt_texts: Vec::new(),
            has_decor: false,
            syntax_on: false,
            syntax_degraded: false,
            cur_syntax: None,
            cur_decor: None,
            spell_on: false,
            spell_src: String::new(),
            word_end: 0,
            cur_checked_col: 0,
            spell_span: None,
            area_active: false,
            from_prev: None,
            vcol_prev: 0,
            search_attr: None,
            search_span: None,
            cul_screenline: false,
            cul_margins: (0, 0),
            line_attr_saved: None,
            line_attr_low_saved: None,
            diff: p.diff,
            diff_group: None,
            statuscol: None,
            statuscol_width: 0,
            statuscol_retry: None,
            lcs_eol: None,
            trail_start: usize::MAX,
            lead_end: 0,
            sbr_cells: 0,
            interrupted: false,
        }
    }

    // ----- prologue ------------------------------------------------------

    fn prepare(&mut self) -> Result<()> {
        let p = self.p;
        if let Some(folds) = &self.collab.folds {
            self.fold_info = folds.info(p.row);
            self.has_fold = self.fold_info.level > 0 && self.fold_info.is_closed();
        }
        if let Some(signs) = &self.collab.signs {
            self.signs = signs.line_signs(p.row);
            self.signs.truncate(SIGN_SHOW_MAX);
        }
        if let Some(decor) = self.collab.decor.as_mut() {
            self.has_decor = decor.begin_line(p.row);
            if self.has_decor {
                self.virt_lines = decor.virt_lines(p.row);
                self.virt_texts = decor.virt_texts(p.row);
            }
        }
        self.ctx.n_virt_rows = self.virt_lines.len();
        self.ctx.filler_rows = p.filler_rows + self.virt_lines.len();
        self.ctx.filler_todo = self.ctx.filler_rows;

        self.syntax_on = self.collab.syntax.is_some() && !self.has_fold && !p.end_fill;
        self.prepare_spell();

        // Whole-line attrs: sign, then quickfix, then diff (per-char).
        self.ctx.line_attr = self.signs.iter().find_map(|s| s.line_attr);
        if p.quickfix_current {
            self.ctx.line_attr = Some(self.theme.get(HlGroup::QuickFixLine));
        }
        if let Some(diff) = &self.diff {
            self.diff_group = Some(match diff.kind {
                DiffKind::Add => HlGroup::DiffAdd,
                DiffKind::Change => HlGroup::DiffChange,
            });
        }

        self.prepare_selection();
        self.prepare_cursorline();

        if self.opts.list && !self.has_fold && !p.end_fill {
            self.lcs_eol = self.opts.list_chars.eol;
            self.prepare_lead_trail();
        }
        self.sbr_cells = segment::normalize_and_segment(&self.opts.show_break)
            .1
            .iter()
            .map(|s| s.width as usize)
            .sum();
        self.ctx.prec_todo = self.opts.list
            && self.opts.list_chars.precedes.is_some()
            && p.skip_cols > 0;

        self.prepare_statuscol()?;
        self.skip_to_start();
        Ok(())
    }

    fn prepare_spell(&mut self) {
        let p = self.p;
        if self.collab.spell.is_none() || self.has_fold || p.end_fill {
            return;
        }
        // Spell offsets must match the raw bytes, so an invalid line
        // simply goes unchecked.
        let Ok(line) = core::str::from_utf8(p.text) else {
            return;
        };
        self.spell_on = true;
        self.spell_src.push_str(line);
        if let Some(next) = p.next_line {
            let mut end = next.len().min(SPELL_LOOKAHEAD);
            while end < next.len() && !next.is_char_boundary(end) {
                end += 1;
            }
            self.spell_src.push_str(&next[..end]);
        }
        // A word that wrapped from the previous line was already
        // checked up to this column.
        if self.state.spell.checked_row == Some(p.row) {
            self.cur_checked_col = self.state.spell.checked_col;
        }
        self.state.spell.checked_row = None;
    }

    fn prepare_selection(&mut self) {
        let Some(sel) = &self.p.selection else {
            return;
        };
        let mut from = Some(sel.from_vcol);
        if sel.noinvcur {
            if sel.from_vcol == sel.cursor_vcol {
                // Highlighting starts at the cursor: start just after it.
                self.from_prev = Some(sel.from_vcol);
                from = None;
            } else if sel.from_vcol < sel.cursor_vcol {
                // Restart highlighting after the cursor.
                self.from_prev = Some(sel.cursor_vcol);
            }
        }
        if let Some(f) = from
            && f >= sel.to_vcol
        {
            from = None;
        }
        self.ctx.from_vcol = from;
        self.ctx.to_vcol = sel.to_vcol;
    }

    fn prepare_cursorline(&mut self) {
        let p = self.p;
        // Not in the text while a selection is active: it would be
        // unclear what is selected.
        if !self.opts.cursorline || p.row != p.cursor_row || p.selection.is_some() {
            return;
        }
        if !self.opts.cursorline_opt.line && !self.opts.cursorline_opt.screenline {
            return;
        }
        self.cul_screenline = self.opts.wrap && self.opts.cursorline_opt.screenline;
        if self.cul_screenline {
            let col_off = gutter::gutter_cells(self.opts, p.line_count, p.cmdline_prompt.is_some());
            self.cul_margins = self.state.margins.margins(
                self.state.win_id,
                p.cursor_vcol,
                col_off,
                p.grid_width,
            );
            self.line_attr_saved = self.ctx.line_attr;
            self.line_attr_low_saved = self.ctx.line_attr_low;
        } else {
            self.apply_cursorline();
        }
    }

    /// Low-priority cursor-line when its attr defines no foreground,
    /// high-priority otherwise.
    fn apply_cursorline(&mut self) {
        let cul = self.theme.get(HlGroup::CursorLine);
        self.ctx.cul_attr = Some(cul);
        if cul.fg.is_none() {
            self.ctx.line_attr_low = Some(cul);
        } else if self.p.quickfix_current {
            self.ctx.line_attr = Some(Attr::combine_opt(self.ctx.line_attr, cul));
        } else {
            self.ctx.line_attr = Some(cul);
        }
    }

    fn prepare_lead_trail(&mut self) {
        let text = self.p.text;
        let lc = &self.opts.list_chars;
        if lc.trail.is_some() || lc.multispace.is_some() {
            let mut t = text.len();
            while t > 0 && (text[t - 1] == b' ' || text[t - 1] == b'\t') {
                t -= 1;
            }
            self.trail_start = t;
        }
        if lc.lead.is_some() || lc.lead_multispace.is_some() {
            let mut l = 0;
            while l < text.len() && (text[l] == b' ' || text[l] == b'\t') {
                l += 1;
            }
            // A line of nothing but blanks is all trailing.
            self.lead_end = if l >= text.len() { 0 } else { l };
        }
    }

    fn prepare_statuscol(&mut self) -> Result<()> {
        if !self.opts.status_column {
            return Ok(());
        }
        let Some(builder) = self.collab.status_column.as_mut() else {
            return Ok(());
        };
        let p = self.p;
        let gutters = gutter::gutter_cells(self.opts, p.line_count, false);
        let mut width = self.state.status_col.width.max(gutters).max(1);
        // A stale line count invalidates the width estimate: rebuild
        // against the new count before drawing anything.
        if self.state.status_col.line_count != p.line_count {
            self.state.status_col.line_count = p.line_count;
            match builder.build(p.line_count.saturating_sub(1), Some(0), 0, width) {
                Ok(built) if built.truncated > 0 => {
                    width += built.truncated;
                    self.state.status_col.width = width;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(row = p.row, %err, "status column width estimate failed");
                }
            }
        }
        let rel = p.row.abs_diff(p.cursor_row);
        match builder.build(p.row, Some(rel), 0, width) {
            Ok(built) => {
                if built.truncated > 0 {
                    let wider = width + built.truncated;
                    self.state.status_col.width = wider;
                    warn!(row = p.row, width = wider, "status column truncated, retrying line");
                    self.statuscol_retry = Some(wider);
                    return Ok(());
                }
                self.statuscol_width = width.max(built.width);
                self.statuscol = Some(StatusColRun::new(Self::pad_statuscol(built, width)));
            }
            Err(err) => {
                warn!(row = p.row, %err, "status column build failed, retrying line");
                self.state.status_col.width = width;
                self.statuscol_retry = Some(width);
            }
        }
        Ok(())
    }

    fn pad_statuscol(
        mut built: crate::providers::StatusColumnText,
        width: usize,
    ) -> crate::providers::StatusColumnText {
        let cells: usize = segment::normalize_and_segment(&built.text)
            .1
            .iter()
            .map(|s| s.width as usize)
            .sum();
        for _ in cells..width {
            built.text.push(' ');
        }
        built
    }

    /// Advance past the virtual columns scrolled out on the left.
    fn skip_to_start(&mut self) {
        let v = self.p.skip_cols;
        if v == 0 || self.p.end_fill || self.has_fold {
            return;
        }
        let text = self.p.text;
        let mut byte = 0usize;
        let mut vcol = 0usize;
        while byte < text.len() && vcol < v {
            let Some(d) = utf8::decode(&text[byte..]) else {
                break;
            };
            let (w, len) = match d {
                utf8::Decoded::Char { c: '\t', len } => {
                    (self.opts.tabstop - (vcol % self.opts.tabstop), len)
                }
                utf8::Decoded::Char { c, len } => {
                    // Escape runs occupy their printed width.
                    let w = match source::escape_char(c) {
                        Some(esc) => esc.chars().count(),
                        None => (egc_width(&c.to_string()) as usize).max(1),
                    };
                    (w, len)
                }
                utf8::Decoded::Illegal(_) => (4, 1),
            };
            if vcol + w > v {
                // Starts left of the window, ends inside it.
                self.ctx.n_skip = v - vcol;
                break;
            }
            vcol += w;
            byte += len;
            // Composing tail belongs to the skipped cluster.
            while let Some(utf8::Decoded::Char { c, len }) = utf8::decode(&text[byte..]) {
                if !utf8::is_composing(c) {
                    break;
                }
                byte += len;
            }
        }
        self.ctx.byte = byte;
        self.ctx.vcol = vcol;
        // Selection bounds left of the window collapse to its edge.
        if self.ctx.to_vcol <= self.ctx.vcol {
            self.ctx.from_vcol = None;
        } else if let Some(f) = self.ctx.from_vcol
            && f < self.ctx.vcol
        {
            self.ctx.from_vcol = Some(self.ctx.vcol);
        }
        if self.opts.wrap {
            self.ctx.need_showbreak = true;
        }
        // Never mark a word misspelled from its middle.
        if self.spell_on {
            let from = self.ctx.byte.min(self.spell_src.len());
            let rest = &self.spell_src[from..];
            let skip = rest
                .find(|ch: char| !ch.is_alphanumeric())
                .unwrap_or(rest.len());
            if self.ctx.byte > 0 && skip > 0 {
                self.word_end = from + skip;
            }
        }
    }

    // ----- helpers -------------------------------------------------------

    fn on_first_text_row(&self) -> bool {
        self.ctx.filler_todo == 0
            && self.ctx.screen_row == self.ctx.start_row + self.ctx.filler_rows
    }

    fn use_cursor_line_gutter(&self) -> bool {
        self.opts.cursorline
            && self.p.row == self.p.cursor_row
            && self.opts.cursorline_opt.number
    }

    fn use_cursor_line_nr(&self) -> bool {
        self.use_cursor_line_gutter()
            && (self.on_first_text_row()
                || (self.ctx.screen_row > self.ctx.start_row + self.ctx.filler_rows
                    && self.opts.cursorline_opt.line))
    }

    fn number_attr_for_statuscol(&self) -> Attr {
        if let Some(a) = self.signs.iter().find_map(|s| s.number_attr) {
            return a;
        }
        let env = self.number_env();
        gutter::line_number_attr(&self.ctx, self.opts, self.theme, &env)
    }

    fn number_env(&self) -> NumberEnv {
        NumberEnv {
            cursor_row: self.p.cursor_row,
            line_count: self.p.line_count,
            on_first_text_row: self.on_first_text_row(),
            pre_scrolled: self.p.skip_cols > 0,
            use_cul_nr: self.use_cursor_line_nr(),
            number_sign_attr: self.signs.iter().find_map(|s| s.number_attr),
        }
    }

    fn diff_attr(&self) -> Option<Attr> {
        self.diff_group.map(|g| self.theme.get(g))
    }

    /// The filler row currently being drawn maps to this virtual line.
    fn virt_line_index(&self) -> Option<usize> {
        if self.ctx.filler_todo == 0 {
            return None;
        }
        let index = self
            .ctx
            .filler_todo
            .checked_sub(self.ctx.filler_rows - self.ctx.n_virt_rows)?;
        if index == 0 {
            return None;
        }
        self.virt_lines.len().checked_sub(index)
    }

    // ----- phase machine -------------------------------------------------

    fn advance_phases(&mut self) {
        while self.ctx.pending.is_none() && self.ctx.phase != Phase::Body {
            let next = self.ctx.phase.next();
            self.ctx.phase = next;
            match next {
                Phase::Start => unreachable!("next() never yields Start"),
                Phase::Cmdline => {
                    gutter::cmdline_prompt(&mut self.ctx, self.p.cmdline_prompt, self.theme);
                }
                Phase::FoldColumn => {
                    // A left-column virtual line covers the gutters.
                    if let Some(i) = self.virt_line_index()
                        && self.virt_lines[i].left_col
                    {
                        self.ctx.phase = Phase::BreakIndent.prev();
                        continue;
                    }
                    if self.statuscol.is_some() {
                        // The status column replaces fold, sign and
                        // number columns.
                        self.ctx.phase = Phase::StatusColumn.prev();
                        continue;
                    }
                    let use_cul = self.use_cursor_line_gutter();
                    gutter::fold_column(
                        &mut self.ctx,
                        self.opts,
                        self.theme,
                        &self.fold_info,
                        use_cul,
                    );
                }
                Phase::SignColumn => {
                    let use_cul = self.use_cursor_line_gutter();
                    let first = self.on_first_text_row();
                    gutter::sign_column(
                        &mut self.ctx,
                        self.opts,
                        self.theme,
                        &self.signs,
                        use_cul,
                        first,
                    );
                }
                Phase::LineNumber => {
                    let env = self.number_env();
                    let sign_over = if self.opts.signs_in_number_column && !self.signs.is_empty() {
                        self.signs.first()
                    } else {
                        None
                    };
                    gutter::number_column(&mut self.ctx, self.opts, self.theme, &env, sign_over);
                }
                Phase::StatusColumn => {
                    if let Some(mut run) = self.statuscol.take() {
                        let number_attr = self.number_attr_for_statuscol();
                        gutter::status_column_segment(&mut self.ctx, &mut run, number_attr);
                        self.statuscol = Some(run);
                    }
                }
                Phase::BreakIndent => {
                    self.ctx.gutter_width = self.rowbuf.used();
                    if self.opts.break_indent_after_break
                        && !self.opts.show_break.is_empty()
                        && self.ctx.need_showbreak
                        && self.ctx.filler_todo == 0
                    {
                        // 'sbr' flag: show-break first, indent after it.
                        let remaining = self.rowbuf.remaining();
                        indent::showbreak_and_filler(
                            &mut self.ctx,
                            self.opts,
                            self.theme,
                            remaining,
                        );
                        self.ctx.phase = Phase::BreakIndent.prev();
                    } else {
                        let diff_attr = self.diff_attr();
                        indent::break_indent(&mut self.ctx, self.opts, self.p.text, diff_attr);
                    }
                }
                Phase::ShowBreak => {
                    let remaining = self.rowbuf.remaining();
                    indent::showbreak_and_filler(&mut self.ctx, self.opts, self.theme, remaining);
                }
                Phase::Body => {
                    self.ctx.continue_body();
                }
            }
        }
    }

    // ----- per-cell highlight bookkeeping --------------------------------

    /// Selection span activation, checked at every body iteration.
    fn update_area(&mut self) {
        let Some(sel) = &self.p.selection else {
            return;
        };
        let vcol = self.ctx.vcol;
        if let Some(from) = self.ctx.from_vcol
            && vcol == from
        {
            self.area_active = true;
        }
        if let Some(fp) = self.from_prev
            && self.vcol_prev == fp
            && self.vcol_prev < vcol
            && vcol < self.ctx.to_vcol
        {
            // Exclusive selection: restart just past the cursor.
            self.area_active = true;
        }
        if self.area_active
            && (vcol == self.ctx.to_vcol || (sel.noinvcur && vcol == sel.cursor_vcol))
        {
            self.area_active = false;
        }
    }

    /// Search/match span covering the current byte; refreshed only when
    /// no run is pending, exactly like the other per-char queries.
    fn update_search(&mut self) {
        let byte = self.ctx.byte;
        self.search_span = self
            .p
            .matches
            .iter()
            .find(|m| m.start <= byte && byte < m.end)
            .copied();
        self.search_attr = self.search_span.map(|m| m.attr);
        // No conceal over the end of the line.
        if byte >= self.p.text.len() {
            self.search_span = None;
        }
    }

    /// Diff changed-text subrange switches the line attr mid-line.
    fn update_diff(&mut self) {
        let Some(diff) = &self.diff else {
            return;
        };
        if diff.kind != DiffKind::Change {
            self.ctx.line_attr = self.diff_attr();
            return;
        }
        let byte = self.ctx.byte;
        let group = if byte >= diff.change_start && byte <= diff.change_end {
            HlGroup::DiffText
        } else {
            HlGroup::DiffChange
        };
        self.diff_group = Some(group);
        let mut attr = self.theme.get(group);
        if let Some(cul) = self.ctx.cul_attr {
            // Low-priority cursorline goes under the diff attr, a
            // foreground-defining one over it.
            attr = if self.ctx.line_attr_low.is_some() {
                Attr::combine(cul, attr)
            } else {
                Attr::combine(attr, cul)
            };
        }
        self.ctx.line_attr = Some(attr);
    }

    fn update_cul_screenline(&mut self) {
        if !self.cul_screenline || self.ctx.phase != Phase::Body {
            return;
        }
        let (left, right) = self.cul_margins;
        if self.ctx.vcol >= left && self.ctx.vcol < right {
            if self.ctx.cul_attr.is_none() {
                self.apply_cursorline();
            }
        } else {
            self.ctx.cul_attr = None;
            self.ctx.line_attr = self.line_attr_saved;
            self.ctx.line_attr_low = self.line_attr_low_saved;
        }
    }

    /// Per-char collaborator queries for the cluster starting at `off`.
    fn query_highlights(&mut self, off: usize) {
        if self.syntax_on
            && let Some(syntax) = self.collab.syntax.as_mut()
        {
            match syntax.query(off) {
                Ok(cell) => self.cur_syntax = Some(cell),
                Err(err) => {
                    debug!(row = self.p.row, %err, "syntax query failed, disabling for line");
                    self.syntax_on = false;
                    self.syntax_degraded = true;
                    self.cur_syntax = None;
                }
            }
        }
        if self.has_decor
            && let Some(decor) = self.collab.decor.as_mut()
        {
            let selected = self.area_active
                || self
                    .p
                    .selection
                    .as_ref()
                    .is_some_and(|s| s.noinvcur && self.ctx.vcol == s.cursor_vcol);
            self.cur_decor = Some(decor.query(off, selected));
        }
        self.query_spell(off);
    }

    fn query_spell(&mut self, off: usize) {
        if !self.spell_on || off < self.word_end || off < self.cur_checked_col {
            return;
        }
        let Some(spell) = self.collab.spell.as_mut() else {
            return;
        };
        if off >= self.spell_src.len() || !self.spell_src.is_char_boundary(off) {
            return;
        }
        let rest = &self.spell_src[off..];
        let Some(first) = rest.chars().next() else {
            return;
        };
        if !first.is_alphanumeric() {
            self.word_end = off + first.len_utf8();
            return;
        }
        let capital_expected =
            self.state.spell.cap_row == Some(self.p.row) && self.state.spell.cap_col == off;
        let (len, kind) = spell.check_word(rest, capital_expected);
        let len = len.max(first.len_utf8());
        self.word_end = off + len;
        let line_len = self.p.text.len();
        self.spell_span = kind.map(|k| {
            let group = match k {
                SpellKind::Bad => HlGroup::SpellBad,
                SpellKind::Rare => HlGroup::SpellRare,
                SpellKind::Local => HlGroup::SpellLocal,
                SpellKind::Caps => HlGroup::SpellCap,
            };
            (off, self.word_end, self.theme.get(group))
        });
        if kind.is_none() && self.word_end > line_len {
            // The good word continues on the next line; remember how far.
            self.state.spell.checked_row = Some(self.p.row + 1);
            self.state.spell.checked_col = self.word_end - line_len;
        }
    }

    // ----- conceal -------------------------------------------------------

    fn conceal_sources(&self) -> Option<(u64, Option<char>, Option<Attr>)> {
        if let Some(m) = &self.search_span
            && m.conceal.is_some()
        {
            let token = (2u64 << 32) | (m.start as u64 & 0xFFFF_FFFF);
            return Some((token, m.conceal, None));
        }
        if let Some(d) = &self.cur_decor
            && d.conceal != ConcealHint::None
        {
            let token = (3u64 << 32) | d.item_id as u64;
            let ch = match d.conceal {
                ConcealHint::Char(c) => Some(c),
                _ => None,
            };
            return Some((token, ch, d.attr));
        }
        if let Some(s) = &self.cur_syntax
            && s.conceal
        {
            let token = (1u64 << 32) | s.item_id as u64;
            return Some((token, s.conceal_char, None));
        }
        None
    }

    fn conceal_check(&mut self) -> ConcealAction {
        let level = self.opts.conceal_level;
        let allowed = level > 0
            && (self.p.row != self.p.cursor_row || self.p.conceal_cursor)
            && self.p.selection.is_none();
        let Some((token, explicit, attr)) = (if allowed { self.conceal_sources() } else { None })
        else {
            self.ctx.conceal_item = None;
            self.ctx.is_concealing = false;
            return ConcealAction::Show;
        };
        let first = self.ctx.conceal_item != Some(token);
        self.ctx.conceal_item = Some(token);
        self.ctx.is_concealing = true;
        let lcs_conceal = self.opts.list_chars.conceal;
        if first && level != 3 && (explicit.is_some() || lcs_conceal.is_some() || level == 1) {
            let sub = explicit
                .or(lcs_conceal)
                .unwrap_or(' ');
            let sub_attr = attr.unwrap_or_else(|| self.theme.get(HlGroup::Conceal));
            ConcealAction::Substitute(sub, sub_attr)
        } else {
            ConcealAction::Skip
        }
    }

    // ----- attr computation ---------------------------------------------

    fn outside_area(&self) -> bool {
        match self.ctx.from_vcol {
            None => self.ctx.to_vcol == usize::MAX,
            Some(from) => self.ctx.vcol < from || self.ctx.vcol >= self.ctx.to_vcol,
        }
    }

    fn resolve_body_attr(&self) -> Attr {
        let sel_attr = self.p.selection.as_ref().map(|s| s.attr);
        let cul = self.ctx.cul_attr;
        let inputs = AttrInputs {
            area: if self.area_active { sel_attr } else { None },
            search: self.search_attr,
            line: self.ctx.line_attr,
            cul,
            cul_low: self.ctx.line_attr_low.is_some(),
            syntax: if self.syntax_on {
                self.cur_syntax.map(|s| s.attr)
            } else {
                None
            },
            spell: self.spell_span.and_then(|(s, e, a)| {
                let b = self.ctx.byte;
                (b > s && b <= e).then_some(a)
            }),
            decor: self.cur_decor.and_then(|d| d.attr),
            term: self
                .p
                .term_attrs
                .and_then(|t| t.get(self.ctx.vcol.saturating_sub(self.ctx.vcol_off)))
                .copied(),
            outside_area: self.outside_area(),
        };
        resolver::resolve(&inputs).attr
    }

    /// Final attr for a unit about to be stored.
    fn cell_attr(&self, unit: &Unit, run_attr: Option<Attr>) -> Attr {
        if let Some(over) = unit.attr_override {
            return over;
        }
        let phase = self.ctx.phase;
        let mut attr = if phase != Phase::Body {
            run_attr.unwrap_or(Attr::EMPTY)
        } else if let Some(fixed) = run_attr {
            // Fold text, filler and friends: a fixed attr, but the
            // selection still shows through on top.
            if self.area_active {
                Attr::combine(
                    fixed,
                    self.p.selection.as_ref().map(|s| s.attr).unwrap_or(Attr::EMPTY),
                )
            } else {
                fixed
            }
        } else {
            self.resolve_body_attr()
        };
        if phase == Phase::Body {
            if self.ctx.extra_cells > 0 && self.search_attr.is_none() && !self.area_active {
                attr = Attr::combine(attr, self.ctx.extra_attr);
            }
            // Lowest-priority line attr underneath everything.
            attr = Attr::combine_opt(self.ctx.line_attr_low, attr);
        }
        if matches!(phase, Phase::BreakIndent | Phase::ShowBreak | Phase::Body)
            && !self.area_active
            && self.search_attr.is_none()
            && self.ctx.filler_todo == 0
        {
            let hlc = self.ctx.vcol.saturating_sub(self.ctx.vcol_off);
            if self.opts.cursor_column
                && hlc == self.p.cursor_vcol
                && self.p.row != self.p.cursor_row
            {
                attr = Attr::combine(self.theme.get(HlGroup::CursorColumn), attr);
            } else if self.opts.color_columns.binary_search(&hlc).is_ok() {
                attr = Attr::combine(self.theme.get(HlGroup::ColorColumn), attr);
            }
        }
        attr
    }

    // ----- storing -------------------------------------------------------

    fn overflow_attr(&self) -> Attr {
        let mut attr = self.theme.get(HlGroup::NonText);
        if let Some(cul) = self.ctx.cul_attr {
            attr = if self.ctx.line_attr_low.is_some() {
                Attr::combine(cul, attr)
            } else {
                Attr::combine(attr, cul)
            };
        }
        attr
    }

    fn store_unit(&mut self, mut unit: Unit, run_attr: Option<Attr>, concealed: Option<Attr>) {
        let phase = self.ctx.phase;
        let body = phase == Phase::Body;

        // A selection boundary halfway through a wide cluster extends
        // to cover the whole cluster.
        if body && unit.width == 2 {
            if self.ctx.to_vcol == self.ctx.vcol + 1 {
                self.ctx.to_vcol += 1;
            }
            if self.ctx.from_vcol == Some(self.ctx.vcol + 1) {
                self.ctx.from_vcol = Some(self.ctx.vcol);
                self.area_active = true;
            }
        }

        let skipping = body && self.ctx.n_skip > 0;
        if skipping {
            self.ctx.n_skip = self.ctx.n_skip.saturating_sub(unit.width.max(1));
        } else {
            // 'extends': mark the last column when text continues past
            // a non-wrapping window edge.
            if body
                && !self.opts.wrap
                && self.opts.list
                && self.ctx.filler_todo == 0
                && self.rowbuf.remaining() == 1
                && self.more_to_come()
                && let Some(ext) = self.opts.list_chars.extends
            {
                unit = Unit {
                    cluster: ext.to_string(),
                    width: 1,
                    attr_override: Some(self.theme.get(HlGroup::NonText)),
                };
            }
            // 'precedes': first visible column of a scrolled row.
            if self.ctx.prec_todo && body && self.ctx.filler_todo == 0 {
                let wide = unit.width == 2;
                if let Some(prec) = self.opts.list_chars.precedes {
                    unit = Unit {
                        cluster: prec.to_string(),
                        width: 1,
                        attr_override: Some(self.theme.get(HlGroup::NonText)),
                    };
                    if wide {
                        // Half of the overwritten wide char remains.
                        self.ctx.pending.get_or_insert_with(|| {
                            crate::context::PendingRun::filled(
                                1,
                                '<',
                                Some(self.theme.get(HlGroup::NonText)),
                            )
                        });
                    }
                }
                self.ctx.prec_todo = false;
            }
            let attr = match concealed {
                Some(conceal_attr) => conceal_attr,
                None => self.cell_attr(&unit, run_attr),
            };
            self.rowbuf.put(&unit.cluster, unit.width, attr);
        }

        self.vcol_prev = self.ctx.vcol;
        if phase > Phase::StatusColumn && self.ctx.filler_todo == 0 {
            self.ctx.vcol += unit.width.max(1);
        }
        if body && self.ctx.extra_cells > 0 {
            self.ctx.extra_cells -= 1;
            if self.ctx.extra_cells == 0 {
                self.ctx.char_attr = self.ctx.saved_after;
            }
        }
    }

    // ----- row lifecycle -------------------------------------------------

    fn more_to_come(&self) -> bool {
        if self.ctx.filler_todo > 0 {
            return true;
        }
        if self.ctx.phase != Phase::Body {
            return false;
        }
        self.ctx.byte < self.p.text.len()
            || self.ctx.deferred.is_some()
            || self
                .ctx
                .pending
                .as_ref()
                .is_some_and(|r| !r.is_done())
            || (self.opts.list && self.lcs_eol.is_some() && self.ctx.eol_todo)
    }

    fn overlay_virt_texts(&mut self, final_row: bool, eol_col: usize) {
        if self.virt_texts.is_empty() {
            return;
        }
        let width = self.p.grid_width;
        let mut right_pos = width;
        let first_row = self.on_first_text_row();
        let texts: Vec<VirtText> = self.virt_texts.clone();
        for vt in &texts {
            let chunk_cells: usize = vt
                .chunks
                .iter()
                .map(|(s, _)| {
                    segment::normalize_and_segment(s)
                        .1
                        .iter()
                        .map(|g| g.width as usize)
                        .sum::<usize>()
                })
                .sum();
            let col = match vt.anchor {
                VirtAnchor::WinCol(c) => {
                    if !first_row {
                        continue;
                    }
                    self.ctx.gutter_width + c
                }
                VirtAnchor::RightAlign => {
                    if !first_row {
                        continue;
                    }
                    right_pos = right_pos.saturating_sub(chunk_cells);
                    right_pos
                }
                VirtAnchor::EndOfLine => {
                    if !final_row {
                        continue;
                    }
                    eol_col
                }
            };
            self.overlay_chunks(col, &vt.chunks, vt.combine);
        }
    }

    fn overlay_chunks(&mut self, mut col: usize, chunks: &[(String, Attr)], combine: bool) {
        for (text, attr) in chunks {
            let (_, segs) = segment::normalize_and_segment(text);
            for seg in segs {
                if col >= self.p.grid_width {
                    return;
                }
                let attr = if combine {
                    Attr::combine(self.rowbuf.attr_at(col), *attr)
                } else {
                    *attr
                };
                self.rowbuf.overlay(col, &seg.cluster, seg.width as usize, attr);
                col += (seg.width as usize).max(1);
            }
        }
    }

    fn commit_row(&mut self, sink: &mut dyn GridSink, wrapped: bool, eol_col: Option<usize>) -> Result<()> {
        // Virtual-line fillers get their chunks painted over the blank
        // canvas the filler run produced.
        if let Some(i) = self.virt_line_index() {
            let line = self.virt_lines[i].clone();
            let col = if line.left_col { 0 } else { self.ctx.gutter_width };
            self.overlay_chunks(col, &line.chunks, false);
        } else {
            self.overlay_virt_texts(eol_col.is_some(), eol_col.unwrap_or(0));
        }
        sink.commit_row(self.ctx.screen_row, self.rowbuf.cells(), wrapped)?;
        Ok(())
    }

    fn drawn(&self) -> LineOutcome {
        LineOutcome::Drawn(DrawnLine {
            rows: self.ctx.screen_row + 1 - self.ctx.start_row,
            interrupted: self.interrupted,
            syntax_degraded: self.syntax_degraded,
        })
    }

    // ----- end of line ---------------------------------------------------

    fn finish_line(&mut self, sink: &mut dyn GridSink) -> Result<LineOutcome> {
        // The '$' list marker, or the blank cell a selection past the
        // line end is shown with; it goes through the normal store path
        // so selection and cursor-line resolution apply.
        if self.ctx.eol_todo && self.ctx.phase == Phase::Body {
            let sel_past_eol = self.p.selection.as_ref().is_some_and(|s| {
                !s.block
                    && self.ctx.from_vcol.is_some()
                    && self.ctx.to_vcol > self.ctx.vcol
                    && !(s.noinvcur && self.ctx.vcol == s.cursor_vcol)
            });
            let list_eol = self.opts.list && self.lcs_eol.is_some();
            if (list_eol || sel_past_eol) && !self.rowbuf.is_full() {
                self.update_area();
                let c = self.lcs_eol.filter(|_| list_eol).unwrap_or(' ');
                let unit = Unit::new(c.to_string(), 1);
                self.ctx.saved_after = self.ctx.char_attr;
                self.ctx.extra_attr = self.theme.get(HlGroup::NonText);
                self.ctx.extra_cells = 1;
                self.store_unit(unit, None, None);
                self.ctx.eol_todo = false;
            }
        }

        // Invert one char after the line end: selection starting
        // exactly there, or a search match ending at end-of-line.
        if self.ctx.eol_todo {
            self.update_area();
            let sel_starts_here = self.ctx.from_vcol == Some(self.ctx.vcol)
                && self.p.selection.as_ref().is_some_and(|s| !s.block);
            let match_at_eol = self
                .p
                .matches
                .iter()
                .find(|m| m.end >= self.p.text.len())
                .map(|m| m.attr);
            if sel_starts_here || match_at_eol.is_some() {
                let base = if sel_starts_here {
                    self.p
                        .selection
                        .as_ref()
                        .map(|s| s.attr)
                        .unwrap_or(Attr::EMPTY)
                } else {
                    match_at_eol.unwrap_or(Attr::EMPTY)
                };
                let attr = match self.ctx.cul_attr {
                    Some(cul) => Attr::combine(cul, base),
                    None => base,
                };
                self.rowbuf.put_eol_highlight(attr);
                self.ctx.vcol += 1;
                self.ctx.eol_todo = false;
            }
        }

        // Bogus cells end with the text.
        self.rowbuf.unbogus(self.ctx.boguscols);
        self.ctx.boguscols = 0;

        let eol_col = self.rowbuf.used();

        // Region past the end of the line: cursor column, color
        // columns, line attrs, diff, terminal attrs.
        let decor_eol = if self.has_decor {
            self.collab
                .decor
                .as_mut()
                .and_then(|d| d.eol_attr(self.p.row))
        } else {
            None
        };
        if let Some(extra) = decor_eol {
            self.ctx.line_attr = Some(Attr::combine_opt(self.ctx.line_attr, extra));
        }
        // Changed-text diff range does not extend past the text.
        if self.diff_group == Some(HlGroup::DiffText) {
            self.diff_group = Some(HlGroup::DiffChange);
        }
        let diff_attr = if self.diff.is_some() {
            self.diff_attr()
        } else {
            None
        };
        let fill_active = self.opts.cursor_column
            || !self.opts.color_columns.is_empty()
            || self.ctx.line_attr.is_some()
            || self.ctx.line_attr_low.is_some()
            || diff_attr.is_some()
            || self.p.term_attrs.is_some();
        if fill_active {
            let mut rightmost = 0usize;
            if self.opts.cursor_column {
                rightmost = self.p.cursor_vcol;
            }
            if let Some(max_cc) = self.opts.color_columns.last() {
                rightmost = rightmost.max(*max_cc);
            }
            let base = Attr::combine_opt(self.ctx.line_attr_low, diff_attr.unwrap_or(Attr::EMPTY));
            if !base.is_empty() || self.ctx.line_attr.is_some() || self.p.term_attrs.is_some() {
                rightmost = usize::MAX;
            }
            while !self.rowbuf.is_full() {
                let hlc = self.ctx.vcol.saturating_sub(self.ctx.vcol_off);
                let mut attr = base;
                if self.opts.cursor_column
                    && hlc == self.p.cursor_vcol
                    && self.p.row != self.p.cursor_row
                {
                    attr = self.theme.get(HlGroup::CursorColumn);
                } else if self.opts.color_columns.binary_search(&hlc).is_ok() {
                    attr = Attr::combine_opt(
                        self.ctx.line_attr_low,
                        self.theme.get(HlGroup::ColorColumn),
                    );
                }
                attr = Attr::combine_opt(Some(attr), self.ctx.line_attr.unwrap_or(Attr::EMPTY));
                if let Some(term) = self.p.term_attrs.and_then(|t| t.get(hlc)) {
                    attr = Attr::combine(*term, attr);
                }
                self.rowbuf.put(" ", 1, attr);
                if hlc >= rightmost {
                    break;
                }
                self.ctx.vcol += 1;
            }
        }

        // After a blank line the next line's first word needs a capital.
        if self.spell_on && self.p.text.iter().all(|b| matches!(b, b' ' | b'\t')) {
            self.state.spell.cap_row = Some(self.p.row + 1);
            self.state.spell.cap_col = 0;
        }

        self.commit_row(sink, false, Some(eol_col))?;
        Ok(self.drawn())
    }

    // ----- the loop ------------------------------------------------------

    fn run(&mut self, sink: &mut dyn GridSink) -> Result<LineOutcome> {
        loop {
            if self.ctx.phase != Phase::Body && self.ctx.pending.is_none() {
                self.advance_phases();
            }
            self.update_cul_screenline();

            // Closed fold: the body is replaced by the fold text run
            // and a fill to the row edge; buffer text is never read.
            if self.ctx.phase == Phase::Body
                && self.has_fold
                && self.ctx.pending.is_none()
                && self.on_first_text_row()
            {
                if !self.fold_text_done {
                    let text = self
                        .collab
                        .folds
                        .as_ref()
                        .map(|f| f.fold_text(self.p.row, &self.fold_info))
                        .unwrap_or_default();
                    self.ctx.pending = Some(crate::context::PendingRun::text(
                        text,
                        Some(self.theme.get(HlGroup::Folded)),
                    ));
                    self.fold_text_done = true;
                } else if !self.fold_fill_done && !self.rowbuf.is_full() {
                    self.ctx.pending = Some(crate::context::PendingRun::filled(
                        self.rowbuf.remaining(),
                        self.opts.fill_chars.fold,
                        Some(self.theme.get(HlGroup::Folded)),
                    ));
                    self.fold_fill_done = true;
                }
            }
            // Fold text that does not fit is truncated, never wrapped.
            if self.has_fold && self.rowbuf.is_full() && self.ctx.phase == Phase::Body {
                self.ctx.pending = None;
            }

            if self.ctx.phase == Phase::Body {
                self.update_area();
                if self.ctx.pending.is_none() {
                    self.update_search();
                    self.update_diff();
                }
            }

            // Acquire exactly one display unit.
            let overflow_attr = self.overflow_attr();
            let mut run_attr = None;
            let mut concealed: Option<Attr> = None;
            let unit = if let Some(run) = &mut self.ctx.pending {
                if run.is_done() {
                    self.ctx.pending = None;
                    continue;
                }
                run_attr = run.attr;
                let (cluster, width) = run.peek();
                if width == 2 && self.rowbuf.remaining() == 1 {
                    // The wide cluster moves to the next row wholesale.
                    Unit {
                        cluster: ">".to_string(),
                        width: 1,
                        attr_override: Some(overflow_attr),
                    }
                } else {
                    run.consume();
                    Unit::new(cluster, width)
                }
            } else if self.ctx.phase == Phase::Body {
                if let Some(d) = self.ctx.deferred.take() {
                    Unit::new(d.cluster, d.width)
                } else {
                    let char_start = self.ctx.byte;
                    let suppress_extra = self.area_active || self.search_attr.is_some();
                    let env = BodyEnv {
                        text: self.p.text,
                        opts: self.opts,
                        theme: self.theme,
                        trail_start: self.trail_start,
                        lead_end: self.lead_end,
                        sbr_cells: self.sbr_cells,
                        suppress_extra,
                    };
                    let step = if self.p.end_fill || self.has_fold {
                        Step::Eol
                    } else {
                        source::next_body_step(&mut self.ctx, &mut self.rowbuf, &env)
                    };
                    match step {
                        Step::Installed => continue,
                        Step::Eol => return self.finish_line(sink),
                        Step::Unit(mut u) => {
                            self.query_highlights(char_start);
                            match self.conceal_check() {
                                ConcealAction::Show => {}
                                ConcealAction::Substitute(c, attr) => {
                                    u = Unit::new(c.to_string(), 1);
                                    concealed = Some(attr);
                                }
                                ConcealAction::Skip => {
                                    let w = u.width.max(1);
                                    self.ctx.vcol += w;
                                    self.ctx.vcol_off += w;
                                    if self.opts.wrap {
                                        self.ctx.boguscols += w;
                                        self.rowbuf.advance_bogus(w);
                                    }
                                    if self.rowbuf.is_full() && self.more_to_come() {
                                        if let Some(outcome) = self.cross_row(sink)? {
                                            return Ok(outcome);
                                        }
                                    }
                                    continue;
                                }
                            }
                            if u.width == 2 && self.rowbuf.remaining() == 1 && self.ctx.n_skip == 0
                            {
                                self.ctx.deferred = Some(DeferredCluster {
                                    cluster: u.cluster.clone(),
                                    width: u.width,
                                });
                                u = Unit {
                                    cluster: ">".to_string(),
                                    width: 1,
                                    attr_override: Some(overflow_attr),
                                };
                            }
                            u
                        }
                    }
                }
            } else {
                // A phase advanced without producing anything.
                continue;
            };

            self.store_unit(unit, run_attr, concealed);

            if self.rowbuf.is_full() {
                // Fold rows never wrap; leftover fold text is dropped
                // at the top of the next iteration.
                if self.has_fold {
                    continue;
                }
                if !self.more_to_come() {
                    // The final cell landed exactly on the edge; the
                    // end-of-line path commits.
                    if self.ctx.phase == Phase::Body
                        && self.ctx.pending.as_ref().is_none_or(|r| r.is_done())
                    {
                        return self.finish_line(sink);
                    }
                }
                if let Some(outcome) = self.cross_row(sink)? {
                    return Ok(outcome);
                }
            }
        }
    }

    /// Row boundary: commit and start the continuation row, or stop.
    /// Returns an outcome when the line is finished.
    fn cross_row(&mut self, sink: &mut dyn GridSink) -> Result<Option<LineOutcome>> {
        let was_filler = self.ctx.filler_todo > 0;
        let wrapped =
            self.opts.wrap && !was_filler && self.ctx.phase == Phase::Body && !self.opts.rightleft;
        self.commit_row(sink, wrapped, None)?;

        // Row full while still in the gutters: the window is too
        // narrow to ever reach the body.
        let stuck = self.ctx.phase != Phase::Body && !was_filler;

        if (!self.opts.wrap && !was_filler) || stuck {
            return Ok(Some(self.drawn()));
        }
        if self.ctx.screen_row + 1 >= self.p.end_row {
            // Geometry exhausted; report how many rows were used.
            return Ok(Some(self.drawn()));
        }
        if let Some(interrupt) = self.collab.interrupt
            && interrupt()
        {
            self.interrupted = true;
            return Ok(Some(self.drawn()));
        }

        self.ctx.screen_row += 1;
        self.rowbuf = RowBuffer::new(self.p.grid_width, self.opts.rightleft);
        self.ctx.start_row(true);
        self.ctx.prec_todo = false;
        if self.ctx.filler_todo == 0 {
            self.ctx.need_showbreak = true;
        }
        if was_filler {
            self.ctx.filler_todo -= 1;
            if self.ctx.filler_todo == 0 && self.p.end_fill {
                // Filler below the last file line: no body row.
                return Ok(Some(self.drawn()));
            }
        }
        // Status column: rebuild for the first text row and the first
        // wrapped row, replay the cached text afterwards.
        if self.statuscol.is_some() {
            let past_filler = self.ctx.screen_row.saturating_sub(self.ctx.start_row);
            let wrap_row = past_filler.saturating_sub(self.ctx.filler_rows);
            if self.ctx.filler_todo == 0 && wrap_row <= 1 {
                if let Some(builder) = self.collab.status_column.as_mut() {
                    let rel = self.p.row.abs_diff(self.p.cursor_row);
                    match builder.build(self.p.row, Some(rel), wrap_row, self.statuscol_width) {
                        Ok(built) if built.truncated > 0 => {
                            let wider = self.statuscol_width + built.truncated;
                            self.state.status_col.width = wider;
                            return Ok(Some(LineOutcome::RetryStatusColumn { width: wider }));
                        }
                        Ok(built) => {
                            self.statuscol =
                                Some(StatusColRun::new(Self::pad_statuscol(built, self.statuscol_width)));
                        }
                        Err(err) => {
                            warn!(row = self.p.row, %err, "status column rebuild failed");
                            return Ok(Some(LineOutcome::RetryStatusColumn {
                                width: self.statuscol_width,
                            }));
                        }
                    }
                }
            } else if let Some(run) = self.statuscol.as_mut() {
                run.rewind();
            }
        }
        Ok(None)
    }
}
