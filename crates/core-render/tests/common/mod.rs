//! Shared harness for the renderer integration tests: a row-collecting
//! grid sink, a theme with distinguishable attrs, and small canned
//! collaborators.
#![allow(dead_code)]

use anyhow::Result;
use core_config::DisplayOptions;
use core_render::attr::Attr;
use core_render::providers::{
    ConcealHint, Collaborators, DecorCell, FoldInfo, FoldSource, GridSink, SignMark, SignSource,
    SpellKind, SpellSource, StatusColumnSource, StatusColumnText, SyntaxCell, SyntaxSource,
    VirtLine, VirtText,
};
use core_render::providers::DecorSource;
use core_render::{
    AttrFlags, Cell, Color, HlGroup, LineOutcome, LineParams, RenderState, Theme, render_line,
};

/// Grid sink that collects committed rows.
#[derive(Default)]
pub struct CollectSink {
    pub rows: Vec<(usize, Vec<Cell>, bool)>,
}

impl GridSink for CollectSink {
    fn commit_row(&mut self, screen_row: usize, cells: &[Cell], wrapped: bool) -> Result<()> {
        self.rows.push((screen_row, cells.to_vec(), wrapped));
        Ok(())
    }
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leader clusters of row `i`, concatenated.
    pub fn text(&self, i: usize) -> String {
        self.rows[i]
            .1
            .iter()
            .filter(|c| c.is_leader())
            .map(|c| c.cluster.as_str())
            .collect()
    }

    /// Per-cell attrs of row `i` (continuations included).
    pub fn attrs(&self, i: usize) -> Vec<Attr> {
        self.rows[i].1.iter().map(|c| c.attr).collect()
    }

    pub fn cells(&self, i: usize) -> &[Cell] {
        &self.rows[i].1
    }

    pub fn wrapped(&self, i: usize) -> bool {
        self.rows[i].2
    }
}

/// A theme where every renderer-owned group is distinguishable.
pub fn test_theme() -> Theme {
    Theme::default()
        .with(HlGroup::NonText, Attr::fg(Color::Blue))
        .with(HlGroup::Whitespace, Attr::fg(Color::Cyan))
        .with(HlGroup::SpecialKey, Attr::fg(Color::Magenta))
        .with(HlGroup::IllegalByte, Attr::fg(Color::Red))
        .with(HlGroup::Conceal, Attr::fg(Color::Grey))
        .with(HlGroup::Folded, Attr::bg(Color::Blue))
        .with(HlGroup::LineNr, Attr::fg(Color::DarkYellow))
        .with(HlGroup::LineNrAbove, Attr::fg(Color::DarkGreen))
        .with(HlGroup::LineNrBelow, Attr::fg(Color::DarkBlue))
        .with(HlGroup::CursorLineNr, Attr::fg(Color::White))
        .with(HlGroup::SignColumn, Attr::bg(Color::DarkMagenta))
        .with(HlGroup::FoldColumn, Attr::fg(Color::DarkCyan))
        .with(
            HlGroup::SpellBad,
            Attr::fg(Color::Red).with_flags(AttrFlags::UNDERCURL),
        )
        .with(HlGroup::CursorLine, Attr::bg(Color::Black))
        .with(HlGroup::DiffAdd, Attr::bg(Color::Green))
        .with(HlGroup::DiffChange, Attr::bg(Color::DarkYellow))
        .with(HlGroup::DiffText, Attr::bg(Color::Yellow))
        .with(HlGroup::DiffDelete, Attr::fg(Color::DarkRed))
        .with(HlGroup::QuickFixLine, Attr::bg(Color::DarkMagenta))
        .with(HlGroup::CursorColumn, Attr::bg(Color::DarkGrey))
        .with(HlGroup::ColorColumn, Attr::bg(Color::DarkRed))
}

pub fn draw(
    params: &LineParams<'_>,
    opts: &DisplayOptions,
    collab: &mut Collaborators<'_>,
) -> (LineOutcome, CollectSink) {
    let mut state = RenderState::new(1);
    draw_with_state(params, opts, collab, &mut state)
}

pub fn draw_with_state(
    params: &LineParams<'_>,
    opts: &DisplayOptions,
    collab: &mut Collaborators<'_>,
    state: &mut RenderState,
) -> (LineOutcome, CollectSink) {
    let theme = test_theme();
    let mut sink = CollectSink::new();
    let outcome = render_line(params, opts, &theme, collab, state, &mut sink)
        .expect("render_line never fails with an infallible sink");
    (outcome, sink)
}

pub fn rows_of(outcome: LineOutcome) -> usize {
    match outcome {
        LineOutcome::Drawn(d) => d.rows,
        LineOutcome::RetryStatusColumn { .. } => panic!("unexpected status column retry"),
    }
}

// ----- canned collaborators ----------------------------------------------

/// Syntax source answering from static spans; optionally failing from a
/// byte offset onward.
#[derive(Default)]
pub struct StaticSyntax {
    pub spans: Vec<(usize, usize, Attr)>,
    /// (start, end, substitute char, item id)
    pub conceal: Vec<(usize, usize, Option<char>, u32)>,
    pub fail_from: Option<usize>,
}

impl SyntaxSource for StaticSyntax {
    fn query(&mut self, off: usize) -> Result<SyntaxCell> {
        if let Some(f) = self.fail_from
            && off >= f
        {
            anyhow::bail!("synthetic syntax failure at {off}");
        }
        let mut cell = SyntaxCell::default();
        for (s, e, a) in &self.spans {
            if off >= *s && off < *e {
                cell.attr = *a;
            }
        }
        for (s, e, c, id) in &self.conceal {
            if off >= *s && off < *e {
                cell.conceal = true;
                cell.conceal_char = *c;
                cell.item_id = *id;
            }
        }
        Ok(cell)
    }
}

/// Spell checker with a fixed list of bad words.
pub struct WordListSpell {
    pub bad: Vec<&'static str>,
}

impl SpellSource for WordListSpell {
    fn check_word(&mut self, text: &str, _capital_expected: bool) -> (usize, Option<SpellKind>) {
        let word: String = text.chars().take_while(|c| c.is_alphanumeric()).collect();
        let len = word.len().max(1);
        if self.bad.iter().any(|b| *b == word) {
            (len, Some(SpellKind::Bad))
        } else {
            (len, None)
        }
    }
}

pub struct StaticSigns(pub Vec<SignMark>);

impl SignSource for StaticSigns {
    fn line_signs(&self, _row: usize) -> Vec<SignMark> {
        let mut v = self.0.clone();
        v.sort_by(|a, b| b.priority.cmp(&a.priority));
        v
    }
}

pub fn sign(text: &str, priority: u32, attr: Attr) -> SignMark {
    SignMark {
        text: text.to_string(),
        attr,
        priority,
        number_attr: None,
        line_attr: None,
        cursorline_attr: None,
    }
}

pub struct StaticFold {
    pub info: FoldInfo,
    pub text: Option<String>,
}

impl FoldSource for StaticFold {
    fn info(&self, _row: usize) -> FoldInfo {
        self.info
    }

    fn fold_text(&self, _row: usize, info: &FoldInfo) -> String {
        self.text
            .clone()
            .unwrap_or_else(|| format!("+--{:>3} lines folded ", info.lines))
    }
}

/// Decoration source built from static pieces.
#[derive(Default)]
pub struct StaticDecor {
    pub spans: Vec<(usize, usize, Attr)>,
    /// (start, end, hint, item id)
    pub conceal: Vec<(usize, usize, ConcealHint, u32)>,
    pub virt_texts: Vec<VirtText>,
    pub virt_lines: Vec<VirtLine>,
    pub eol: Option<Attr>,
}

impl DecorSource for StaticDecor {
    fn begin_line(&mut self, _row: usize) -> bool {
        !(self.spans.is_empty()
            && self.conceal.is_empty()
            && self.virt_texts.is_empty()
            && self.virt_lines.is_empty()
            && self.eol.is_none())
    }

    fn query(&mut self, off: usize, _selected: bool) -> DecorCell {
        let mut cell = DecorCell::default();
        for (s, e, a) in &self.spans {
            if off >= *s && off < *e {
                cell.attr = Some(*a);
            }
        }
        for (s, e, hint, id) in &self.conceal {
            if off >= *s && off < *e {
                cell.conceal = *hint;
                cell.item_id = *id;
            }
        }
        cell
    }

    fn virt_texts(&mut self, _row: usize) -> Vec<VirtText> {
        self.virt_texts.clone()
    }

    fn virt_lines(&mut self, _row: usize) -> Vec<VirtLine> {
        self.virt_lines.clone()
    }

    fn eol_attr(&mut self, _row: usize) -> Option<Attr> {
        self.eol
    }
}

/// Status column builder rendering `"<lnum><mark>"` where the mark shows
/// whether this is a wrapped row; one highlight breakpoint after the
/// number.
pub struct TemplateStatusCol {
    pub truncate: usize,
    pub fail: bool,
    pub mark_attr: Attr,
}

impl TemplateStatusCol {
    pub fn new() -> Self {
        Self {
            truncate: 0,
            fail: false,
            mark_attr: Attr::fg(Color::Green),
        }
    }
}

impl StatusColumnSource for TemplateStatusCol {
    fn build(
        &mut self,
        row: usize,
        _rel_row: Option<usize>,
        wrap_row: usize,
        width: usize,
    ) -> Result<StatusColumnText> {
        if self.fail {
            anyhow::bail!("synthetic status column failure");
        }
        let text = format!("{}{}", row + 1, if wrap_row > 0 { ">" } else { "|" });
        let number_len = text.len() - 1;
        Ok(StatusColumnText {
            text,
            width,
            segments: vec![(number_len, Some(self.mark_attr))],
            truncated: self.truncate,
        })
    }
}
