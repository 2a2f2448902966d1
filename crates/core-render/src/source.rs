//! Character source: produce the next display unit of the body text.
//!
//! One call yields exactly one of:
//! - a ready display unit (grapheme cluster plus width),
//! - a freshly installed synthetic run (escape form, tab expansion,
//!   left-edge filler) for the engine to drain on following iterations,
//! - end of line.
//!
//! Everything byte-shaped happens here: UTF-8 decoding with illegal
//! bytes surfaced as `<xx>` escape runs, composing-character
//! accumulation onto the base character, Arabic contextual shaping with
//! direction-dependent neighbour lookup, tab expansion against the
//! current virtual column (including the conceal reconciliation that
//! keeps tab stops identical regardless of conceal level), list-mode
//! whitespace markers, and escape forms for non-printable characters.

use crate::attr::{Attr, HlGroup, Theme};
use crate::context::{LineContext, PendingRun};
use crate::rowbuf::RowBuffer;
use core_config::DisplayOptions;
use core_text::{arabic, egc_width, utf8};

/// Most composing characters accumulated onto one base character.
pub const MAX_COMPOSING: usize = 6;

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';

/// One display unit ready for the cell writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub cluster: String,
    pub width: usize,
    /// Full attr replacement (overflow and edge markers).
    pub attr_override: Option<Attr>,
}

impl Unit {
    pub fn new(cluster: String, width: usize) -> Self {
        Self {
            cluster,
            width,
            attr_override: None,
        }
    }
}

/// Result of one source step.
#[derive(Debug, PartialEq)]
pub enum Step {
    Unit(Unit),
    /// A pending run was installed; the engine loops and drains it.
    Installed,
    /// Line text exhausted.
    Eol,
}

/// Per-line inputs the source needs besides the context.
pub struct BodyEnv<'a> {
    pub text: &'a [u8],
    pub opts: &'a DisplayOptions,
    pub theme: &'a Theme,
    /// Byte offset where trailing whitespace starts (`usize::MAX` off).
    pub trail_start: usize,
    /// Byte offset one past the leading whitespace (0 when off).
    pub lead_end: usize,
    /// Display cells of the show-break marker (tab adjustment).
    pub sbr_cells: usize,
    /// Suppress the escape-form attr override because a selection or
    /// search attr owns this span.
    pub suppress_extra: bool,
}

pub fn is_printable(c: char) -> bool {
    // Control chars plus the Unicode line/paragraph separators, which
    // would break the one-line-per-row contract if printed raw.
    !(c.is_control() || c == '\u{2028}' || c == '\u{2029}')
}

/// Escape form of a non-printable char: `^X` for C0 controls and DEL,
/// hex otherwise. `None` when printable.
pub fn escape_char(c: char) -> Option<String> {
    if is_printable(c) {
        return None;
    }
    let n = c as u32;
    if n < 0x20 {
        return Some(format!("^{}", char::from((n as u8) + 0x40)));
    }
    if n == 0x7F {
        return Some("^?".to_string());
    }
    if n <= 0xFF {
        Some(format!("<{n:02x}>"))
    } else {
        Some(format!("<{n:04x}>"))
    }
}

/// Replace non-printable chars in `s` by their escape forms (status
/// column text and similar pre-built strings).
pub fn transstr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(esc) => out.push_str(&esc),
            None => out.push(c),
        }
    }
    out
}

/// Reverse a marker string for right-to-left rows.
pub fn mirror_ascii(s: &str) -> String {
    s.chars().rev().collect()
}

/// Install the attr-override span used by escape forms and list
/// markers: `cells` units drawn with `group`'s attr on top, then the
/// current attr is restored.
fn set_extra(ctx: &mut LineContext, env: &BodyEnv, cells: usize, group: HlGroup) {
    if env.suppress_extra {
        return;
    }
    ctx.saved_after = ctx.char_attr;
    ctx.extra_attr = env.theme.get(group);
    ctx.extra_cells = cells;
}

/// Assemble the cluster starting at `start`: base char plus composing
/// marks, ZWJ joins, and variation selectors. A composing char with no
/// base gets a space base. Returns (cluster, base char, next offset).
fn assemble(text: &[u8], start: usize, first: char, first_len: usize) -> (String, char, usize) {
    let mut cluster = String::new();
    let base;
    if utf8::is_composing(first) {
        cluster.push(' ');
        base = ' ';
    } else {
        base = first;
    }
    cluster.push(first);
    let mut off = start + first_len;
    let mut prev = first;
    let mut composing = 0usize;
    while let Some(utf8::Decoded::Char { c, len }) = utf8::decode(&text[off.min(text.len())..]) {
        let joins = if utf8::is_composing(c) {
            composing += 1;
            composing <= MAX_COMPOSING
        } else {
            c == ZWJ || prev == ZWJ || c == VS16
        };
        if !joins {
            break;
        }
        cluster.push(c);
        off += len;
        prev = c;
    }
    (cluster, base, off)
}

/// First base (non-joining) char at or after `off`, for shaping context.
fn peek_next_base(text: &[u8], mut off: usize) -> Option<char> {
    while off < text.len() {
        match utf8::decode(&text[off..])? {
            utf8::Decoded::Char { c, len } => {
                if utf8::is_composing(c) || c == ZWJ || c == VS16 {
                    off += len;
                    continue;
                }
                return Some(c);
            }
            utf8::Decoded::Illegal(_) => return None,
        }
    }
    None
}

/// List-mode marker replacement for one space-like char, if any.
fn list_marker(ctx: &mut LineContext, env: &BodyEnv, c: char, at: usize) -> Option<char> {
    if !env.opts.list {
        return None;
    }
    let lc = &env.opts.list_chars;
    if (c == '\u{A0}' || c == '\u{202F}') && lc.nbsp.is_some() {
        return lc.nbsp;
    }
    if c != ' ' {
        return None;
    }
    let next_is_space = env.text.get(at + 1) == Some(&b' ');
    let prev_is_space = at > 0 && env.text.get(at - 1) == Some(&b' ');
    let in_multispace = next_is_space || prev_is_space;
    if !in_multispace {
        ctx.multispace_pos = 0;
    }
    if at >= env.trail_start {
        return lc.trail;
    }
    if at < env.lead_end {
        if in_multispace && let Some(seq) = &lc.lead_multispace {
            let m = seq[ctx.multispace_pos % seq.len()];
            ctx.multispace_pos += 1;
            return Some(m);
        }
        if lc.lead.is_some() {
            return lc.lead;
        }
        return lc.space;
    }
    if in_multispace && let Some(seq) = &lc.multispace {
        let m = seq[ctx.multispace_pos % seq.len()];
        ctx.multispace_pos += 1;
        return Some(m);
    }
    lc.space
}

/// Expand a tab at the current virtual column into a pending run.
fn install_tab(ctx: &mut LineContext, rowbuf: &mut RowBuffer, env: &BodyEnv) {
    let ts = env.opts.tabstop;
    // Right after the show-break marker the tab must not be charged for
    // the marker's cells again.
    let vcol_adj = if env.sbr_cells > 0 && ctx.vcol_sbr == Some(ctx.vcol) {
        ctx.vcol - env.sbr_cells.min(ctx.vcol)
    } else {
        ctx.vcol
    };
    let tab_len = ts - (vcol_adj % ts);
    // Tab alignment is identical regardless of 'conceallevel': the tab
    // absorbs all columns concealment skipped so far on this line.
    let bogus = ctx.boguscols;
    let off = ctx.reconcile_conceal();
    rowbuf.unbogus(bogus);
    let total = tab_len + off;

    let lc = &env.opts.list_chars;
    if env.opts.list && let Some(head) = lc.tab_head {
        let fill = lc.tab_fill.unwrap_or(' ');
        let mut s = String::with_capacity(total * 4);
        s.push(head);
        for _ in 1..total {
            s.push(fill);
        }
        if let Some(tail) = lc.tab_tail {
            s.pop();
            s.push(tail);
        }
        set_extra(ctx, env, total, HlGroup::Whitespace);
        ctx.pending = Some(PendingRun::text(s, None));
    } else {
        ctx.pending = Some(PendingRun::filled(total, ' ', None));
    }
}

/// Produce the next body step. `ctx.byte` is advanced past whatever the
/// step consumed; a deferred wide cluster is the engine's business and
/// never reaches this function.
pub fn next_body_step(ctx: &mut LineContext, rowbuf: &mut RowBuffer, env: &BodyEnv) -> Step {
    if ctx.byte >= env.text.len() {
        return Step::Eol;
    }
    let decoded = match utf8::decode(&env.text[ctx.byte..]) {
        Some(d) => d,
        None => return Step::Eol,
    };

    let (c, len) = match decoded {
        utf8::Decoded::Illegal(b) => {
            // Illegal byte: a hex escape run with its own attr, decode
            // resumes at the next byte.
            let mut esc = format!("<{b:02x}>");
            if env.opts.rightleft {
                esc = mirror_ascii(&esc);
            }
            set_extra(ctx, env, esc.chars().count(), HlGroup::IllegalByte);
            ctx.pending = Some(PendingRun::text(esc, None));
            ctx.byte += 1;
            return Step::Installed;
        }
        utf8::Decoded::Char { c, len } => (c, len),
    };

    let (mut cluster, base, next_off) = assemble(env.text, ctx.byte, c, len);

    // A wide char straddling the left edge of a scrolled window shows a
    // half-wide filler in the first visible column.
    if ctx.n_skip > 0 && egc_width(&cluster) == 2 && base != '\t' {
        ctx.byte = next_off;
        set_extra(ctx, env, 2, HlGroup::NonText);
        ctx.pending = Some(PendingRun::text(" <".to_string(), None));
        return Step::Installed;
    }

    if base == '\t' {
        ctx.byte = next_off;
        install_tab(ctx, rowbuf, env);
        ctx.prev_base = Some(base);
        return Step::Installed;
    }

    // List-mode whitespace markers replace a lone space-like char.
    if cluster.chars().count() == 1
        && let Some(marker) = list_marker(ctx, env, base, ctx.byte)
    {
        ctx.byte = next_off;
        set_extra(ctx, env, 1, HlGroup::Whitespace);
        ctx.prev_base = Some(base);
        let w = (egc_width(&marker.to_string()) as usize).max(1);
        return Step::Unit(Unit::new(marker.to_string(), w));
    }

    if let Some(esc) = escape_char(base) {
        // Non-printable: escape form run, composing marks dropped.
        let esc = if env.opts.rightleft {
            mirror_ascii(&esc)
        } else {
            esc
        };
        ctx.byte = next_off;
        set_extra(ctx, env, esc.chars().count(), HlGroup::SpecialKey);
        ctx.pending = Some(PendingRun::text(esc, None));
        return Step::Installed;
    }

    // Arabic shaping: neighbour roles depend on the text direction.
    if env.opts.arabic_shape && arabic::is_arabic(base) {
        let next_base = peek_next_base(env.text, next_off);
        let (prev, next) = if env.opts.rightleft {
            (ctx.prev_base, next_base)
        } else {
            (next_base, ctx.prev_base)
        };
        let shaped = arabic::shape(base, prev, next);
        if shaped != base {
            let tail: String = cluster.chars().skip(1).collect();
            cluster = shaped.to_string();
            cluster.push_str(&tail);
        }
    }
    ctx.prev_base = Some(base);

    ctx.byte = next_off;
    let width = (egc_width(&cluster) as usize).max(1);
    Step::Unit(Unit::new(cluster, width))
}
