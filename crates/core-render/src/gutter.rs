//! Gutter segment producers: the fixed-width decoration columns drawn
//! before the line text, activated once per physical row in a fixed
//! order. Each producer either declines or installs one synthetic run
//! plus its attr; the sign and status-column producers may re-enter
//! their own phase to emit several runs in sequence.

use crate::attr::{Attr, HlGroup, Theme};
use crate::context::{LineContext, PendingRun, Phase};
use crate::providers::{FoldInfo, SignMark, StatusColumnText};
use crate::source::transstr;
use core_config::DisplayOptions;
use core_text::segment;

/// Cells of one sign-column segment.
pub const SIGN_COL_WIDTH: usize = 2;

/// Width of the number column: the configured minimum, grown to fit the
/// largest line number plus its trailing separator space.
pub fn number_col_width(opts: &DisplayOptions, line_count: usize) -> usize {
    let digits = line_count.max(1).ilog10() as usize + 1;
    opts.number_width.max(digits + 1)
}

/// Total gutter cells on a row; what the status column replaces when
/// configured.
pub fn gutter_cells(opts: &DisplayOptions, line_count: usize, cmdline: bool) -> usize {
    let mut cells = opts.fold_column + opts.sign_columns * SIGN_COL_WIDTH;
    if opts.number || opts.relative_number {
        cells += number_col_width(opts, line_count);
    }
    if cmdline {
        cells += 1;
    }
    cells
}

/// Command-line window prompt column: one marker cell.
pub fn cmdline_prompt(ctx: &mut LineContext, prompt: Option<char>, theme: &Theme) {
    if let Some(c) = prompt {
        ctx.pending = Some(PendingRun::filled(
            1,
            c,
            Some(theme.get(HlGroup::NonText)),
        ));
    }
}

/// Glyphs for the fold indicator column, exactly `fold_column` chars.
/// A column narrower than the fold depth starts at the lowest level
/// that fits and shows depth numerals.
fn fold_glyphs(opts: &DisplayOptions, info: &FoldInfo, row: usize) -> String {
    let fdc = opts.fold_column;
    let fc = &opts.fill_chars;
    let closed = info.is_closed();
    let mut out = String::new();

    let first_level = (info.level as isize - fdc as isize - closed as isize + 1).max(1) as usize;
    let mut i = 0;
    while i < fdc.min(info.level) {
        let level_here = first_level + i;
        let symbol = if info.start_row == row && level_here >= info.low_level {
            fc.fold_open
        } else if first_level == 1 {
            fc.fold_sep
        } else if level_here <= 9 {
            char::from(b'0' + level_here as u8)
        } else {
            '>'
        };
        out.push(symbol);
        i += 1;
        if level_here >= info.level {
            break;
        }
    }
    if closed {
        out.pop();
        out.push(fc.fold_closed);
    }
    while out.chars().count() < fdc {
        out.push(' ');
    }
    out
}

/// Fold indicator column producer.
pub fn fold_column(
    ctx: &mut LineContext,
    opts: &DisplayOptions,
    theme: &Theme,
    info: &FoldInfo,
    use_cul: bool,
) {
    if opts.fold_column == 0 {
        return;
    }
    let attr = theme.get(if use_cul {
        HlGroup::CursorLineFold
    } else {
        HlGroup::FoldColumn
    });
    let glyphs = fold_glyphs(opts, info, ctx.row);
    ctx.pending = Some(PendingRun::text(glyphs, Some(attr)));
}

/// Pad `text` to `cells` display cells with trailing blanks.
fn pad_to_cells(text: &str, cells: usize) -> String {
    let (_, segs) = segment::normalize_and_segment(text);
    let used: usize = segs.iter().map(|s| s.width as usize).sum();
    let mut out = text.to_string();
    for _ in used..cells {
        out.push(' ');
    }
    out
}

/// Sign column producer for the segment `ctx.sign_idx`. Returns whether
/// another segment follows (the phase re-enters itself).
pub fn sign_column(
    ctx: &mut LineContext,
    opts: &DisplayOptions,
    theme: &Theme,
    signs: &[SignMark],
    use_cul: bool,
    on_first_text_row: bool,
) -> bool {
    if opts.sign_columns == 0 {
        return false;
    }
    let mut attr = theme.get(if use_cul {
        HlGroup::CursorLineSign
    } else {
        HlGroup::SignColumn
    });
    let mut run = PendingRun::filled(SIGN_COL_WIDTH, ' ', None);
    if on_first_text_row && let Some(sign) = signs.get(ctx.sign_idx) {
        attr = match (use_cul, sign.cursorline_attr) {
            (true, Some(cul)) => cul,
            _ => sign.attr,
        };
        run = PendingRun::text(pad_to_cells(&sign.text, SIGN_COL_WIDTH), None);
    }
    run.attr = Some(attr);
    ctx.pending = Some(run);

    ctx.sign_idx += 1;
    if ctx.sign_idx < opts.sign_columns {
        ctx.phase = Phase::SignColumn.prev();
        true
    } else {
        ctx.sign_idx = 0;
        false
    }
}

/// Inputs for the line-number producer beyond the context itself.
pub struct NumberEnv {
    pub cursor_row: usize,
    pub line_count: usize,
    pub on_first_text_row: bool,
    /// The line is horizontally pre-scrolled; leading blanks of the
    /// number become '-'.
    pub pre_scrolled: bool,
    /// CursorLineNr applies on this row.
    pub use_cul_nr: bool,
    /// Number-column attr claimed by a sign on this line.
    pub number_sign_attr: Option<Attr>,
}

/// Attr for the number column: cursor-line override, then the
/// above/below split for relative numbering.
pub fn line_number_attr(
    ctx: &LineContext,
    opts: &DisplayOptions,
    theme: &Theme,
    env: &NumberEnv,
) -> Attr {
    if env.use_cul_nr {
        return theme.get(HlGroup::CursorLineNr);
    }
    if opts.relative_number {
        if ctx.row < env.cursor_row {
            return theme.get(HlGroup::LineNrAbove);
        }
        if ctx.row > env.cursor_row {
            return theme.get(HlGroup::LineNrBelow);
        }
    }
    theme.get(HlGroup::LineNr)
}

/// Format the number column text for the first row of a line.
fn number_text(ctx: &LineContext, opts: &DisplayOptions, env: &NumberEnv, width: usize) -> String {
    let lnum = ctx.row + 1;
    let mut s = if opts.relative_number {
        let rel = ctx.row.abs_diff(env.cursor_row);
        if rel == 0 && opts.number {
            // Cursor line shows the absolute number, left-aligned.
            format!("{:<w$} ", lnum, w = width - 1)
        } else {
            format!("{:>w$} ", rel, w = width - 1)
        }
    } else {
        format!("{:>w$} ", lnum, w = width - 1)
    };
    if env.pre_scrolled {
        let dashes: String = s
            .chars()
            .scan(true, |lead, c| {
                if *lead && c == ' ' {
                    Some('-')
                } else {
                    *lead = false;
                    Some(c)
                }
            })
            .collect();
        s = dashes;
    }
    if opts.rightleft {
        // Mirror the digits but keep the trailing separator in place.
        let digits: String = s.trim_end_matches(' ').chars().rev().collect();
        let pad = s.len() - digits.len();
        s = format!("{digits}{}", " ".repeat(pad));
    }
    s
}

/// Line-number column producer. `sign_over_number` carries the sign to
/// show instead of the number when 'signcolumn' is in number-column
/// mode and the line has signs.
pub fn number_column(
    ctx: &mut LineContext,
    opts: &DisplayOptions,
    theme: &Theme,
    env: &NumberEnv,
    sign_over_number: Option<&SignMark>,
) {
    if !opts.number && !opts.relative_number {
        return;
    }
    let width = number_col_width(opts, env.line_count);
    if let Some(sign) = sign_over_number {
        if env.on_first_text_row {
            let text_w: usize = segment::normalize_and_segment(&sign.text)
                .1
                .iter()
                .map(|s| s.width as usize)
                .sum();
            let pad = width.saturating_sub(1 + text_w);
            let s = format!("{}{} ", " ".repeat(pad), sign.text);
            ctx.pending = Some(PendingRun::text(s, Some(sign.attr)));
        } else {
            ctx.pending = Some(PendingRun::filled(width, ' ', Some(sign.attr)));
        }
        return;
    }
    let mut attr = line_number_attr(ctx, opts, theme, env);
    if let Some(sign) = env.number_sign_attr {
        attr = sign;
    }
    let run = if env.on_first_text_row {
        PendingRun::text(number_text(ctx, opts, env, width), Some(attr))
    } else {
        // Blank on continuation rows.
        PendingRun::filled(width, ' ', Some(attr))
    };
    ctx.pending = Some(run);
}

/// Streaming state for the status column producer: the built text is
/// replayed breakpoint by breakpoint, across wrapped rows.
#[derive(Debug, Clone)]
pub struct StatusColRun {
    pub built: StatusColumnText,
    byte: usize,
    seg: usize,
    cur_attr: Option<Attr>,
}

impl StatusColRun {
    pub fn new(built: StatusColumnText) -> Self {
        Self {
            built,
            byte: 0,
            seg: 0,
            cur_attr: None,
        }
    }

    /// Rewind for replay on the next physical row.
    pub fn rewind(&mut self) {
        self.byte = 0;
        self.seg = 0;
        self.cur_attr = None;
    }
}

/// Emit the next status-column section as a pending run. Returns whether
/// more sections follow (the phase re-enters itself).
pub fn status_column_segment(
    ctx: &mut LineContext,
    run: &mut StatusColRun,
    number_attr: Attr,
) -> bool {
    let text_len = run.built.text.len();
    loop {
        if run.byte >= text_len {
            return false;
        }
        let section_end = run
            .built
            .segments
            .get(run.seg)
            .map(|(off, _)| *off)
            .unwrap_or(text_len)
            .clamp(run.byte, text_len);
        let attr = run.cur_attr.unwrap_or(number_attr);
        if section_end > run.byte {
            let piece = transstr(&run.built.text[run.byte..section_end]);
            run.byte = section_end;
            if run.seg < run.built.segments.len() {
                run.cur_attr = run.built.segments[run.seg].1;
                run.seg += 1;
            }
            if piece.is_empty() {
                continue;
            }
            ctx.pending = Some(PendingRun::text(piece, Some(attr)));
            let more = run.byte < text_len;
            if more {
                ctx.phase = Phase::StatusColumn.prev();
            }
            return more;
        }
        // Empty section: take its attr and continue.
        if run.seg < run.built.segments.len() {
            run.cur_attr = run.built.segments[run.seg].1;
            run.seg += 1;
        } else {
            return false;
        }
    }
}
