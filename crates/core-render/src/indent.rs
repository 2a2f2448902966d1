//! Break-indent and show-break producers, plus the filler-row runs that
//! share their phase slot: all of them decorate the space between the
//! gutters and the text body on continuation and synthetic rows.

use crate::attr::{Attr, HlGroup, Theme};
use crate::context::{LineContext, PendingRun};
use core_config::DisplayOptions;
use core_text::utf8;

/// Display cells of the leading whitespace of `text` (the indent a
/// wrapped row repeats).
pub fn breakindent_width(text: &[u8], tabstop: usize) -> usize {
    let mut cells = 0usize;
    let mut off = 0usize;
    while let Some(d) = utf8::decode(&text[off..]) {
        match d {
            utf8::Decoded::Char { c: ' ', len } => {
                cells += 1;
                off += len;
            }
            utf8::Decoded::Char { c: '\t', len } => {
                cells += tabstop - (cells % tabstop);
                off += len;
            }
            _ => break,
        }
    }
    cells
}

/// Break-indent producer: blank cells repeating the line's indent on
/// every physical row after the first (or on a pre-scrolled first row).
/// Skipped entirely when the line has filler rows.
pub fn break_indent(
    ctx: &mut LineContext,
    opts: &DisplayOptions,
    text: &[u8],
    diff_attr: Option<Attr>,
) {
    if !opts.break_indent
        || (ctx.screen_row == ctx.start_row && !ctx.need_showbreak)
        || ctx.filler_rows != 0
    {
        return;
    }
    let n = breakindent_width(text, opts.tabstop);
    if n == 0 {
        return;
    }
    ctx.pending = Some(PendingRun::filled(
        n,
        ' ',
        Some(diff_attr.unwrap_or(Attr::EMPTY)),
    ));
    // Keep the highlighted area's end in step when it ends right here.
    if ctx.to_vcol == ctx.vcol {
        ctx.to_vcol += n;
    }
}

/// Filler-row runs (virtual-line slots and diff padding) and the
/// show-break marker. Filler runs blank or dash the whole remaining
/// row; show-break emits the configured marker with its own attr,
/// combined with a low-priority cursor-line attr when present.
pub fn showbreak_and_filler(ctx: &mut LineContext, opts: &DisplayOptions, theme: &Theme, remaining: usize) {
    if ctx.filler_todo > ctx.filler_rows - ctx.n_virt_rows {
        // A virtual-line slot: blank canvas, chunks overlaid at commit.
        ctx.pending = Some(PendingRun::filled(remaining, ' ', Some(Attr::EMPTY)));
        return;
    }
    if ctx.filler_todo > 0 {
        // Deleted-line diff padding.
        ctx.pending = Some(PendingRun::filled(
            remaining,
            opts.fill_chars.diff,
            Some(theme.get(HlGroup::DiffDelete)),
        ));
        return;
    }
    if opts.show_break.is_empty() || !ctx.need_showbreak {
        return;
    }
    let mut attr = theme.get(HlGroup::NonText);
    if let Some(cul) = ctx.cul_attr {
        // Show-break wins over cursor-line where both define a field.
        attr = Attr::combine(cul, attr);
    }
    let sbr = opts.show_break.clone();
    let cells: usize = core_text::segment::normalize_and_segment(&sbr)
        .1
        .iter()
        .map(|s| s.width as usize)
        .sum();
    ctx.pending = Some(PendingRun::text(sbr, Some(attr)));
    ctx.need_showbreak = false;
    // Remember where text resumes so a tab right after the marker is
    // not charged for the marker's cells.
    ctx.vcol_sbr = Some(ctx.vcol + cells);
    if ctx.to_vcol == ctx.vcol {
        ctx.to_vcol += cells;
    }
}
