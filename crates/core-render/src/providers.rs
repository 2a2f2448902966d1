//! Collaborator boundaries.
//!
//! The renderer decides nothing about *what* is highlighted; these
//! traits are the query contracts against the owners of that policy.
//! All queries are synchronous in-memory lookups supplied by the caller
//! for the duration of one `render_line` call.
//!
//! Failure policy per collaborator:
//! - syntax: an `Err` disables syntax highlighting for the remainder of
//!   the current line only;
//! - status column: a build error or reported truncation aborts the
//!   line and surfaces a rebuild-and-retry outcome;
//! - everything else is infallible by contract.

use crate::Cell;
use crate::attr::Attr;
use anyhow::Result;

/// Most sign marks considered per line.
pub const SIGN_SHOW_MAX: usize = 9;

/// Bytes of the next line made visible to the spell checker so words
/// wrapping across the line break are still found.
pub const SPELL_LOOKAHEAD: usize = 150;

/// Per-column syntax answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyntaxCell {
    pub attr: Attr,
    /// This column is inside a concealed syntax item.
    pub conceal: bool,
    /// Item-defined substitute char shown for the first cell of the item.
    pub conceal_char: Option<char>,
    /// Item identity; consecutive columns with the same id belong to one
    /// concealed item and share its single substitute char.
    pub item_id: u32,
}

pub trait SyntaxSource {
    /// Attr and conceal state for the byte offset `off` in the line.
    fn query(&mut self, off: usize) -> Result<SyntaxCell>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellKind {
    Bad,
    Rare,
    Local,
    Caps,
}

pub trait SpellSource {
    /// Inspect the word at the start of `text` (which may extend past
    /// the rendered line into the next one). `capital_expected` is set
    /// when the previous line ended a sentence and this word should
    /// start with a capital. Returns the word's byte length and its
    /// verdict; `None` means correctly spelled.
    fn check_word(&mut self, text: &str, capital_expected: bool) -> (usize, Option<SpellKind>);
}

/// Conceal request attached to a decoration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcealHint {
    #[default]
    None,
    /// Hide the column (subject to the conceal level).
    Hide,
    /// Replace the concealed item with this char.
    Char(char),
}

/// Per-column decoration answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecorCell {
    pub attr: Option<Attr>,
    pub conceal: ConcealHint,
    /// Identity for one-substitute-per-item accounting.
    pub item_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtAnchor {
    /// Fixed window column (0 = window start).
    WinCol(usize),
    EndOfLine,
    RightAlign,
}

#[derive(Debug, Clone)]
pub struct VirtText {
    pub chunks: Vec<(String, Attr)>,
    pub anchor: VirtAnchor,
    /// Combine with the cell attrs underneath instead of replacing them.
    pub combine: bool,
}

/// A full synthetic row drawn above the line.
#[derive(Debug, Clone)]
pub struct VirtLine {
    pub chunks: Vec<(String, Attr)>,
    /// Start at window column 0 instead of after the gutters.
    pub left_col: bool,
}

pub trait DecorSource {
    /// Prime per-line state. `false` means the line carries no
    /// decorations and per-column queries are skipped.
    fn begin_line(&mut self, row: usize) -> bool;

    /// Attr and conceal state for byte offset `off`. `selected` reports
    /// whether the cell is inside the active selection, which some
    /// decorations use to disable themselves.
    fn query(&mut self, off: usize, selected: bool) -> DecorCell;

    fn virt_texts(&mut self, _row: usize) -> Vec<VirtText> {
        Vec::new()
    }

    fn virt_lines(&mut self, _row: usize) -> Vec<VirtLine> {
        Vec::new()
    }

    /// Whole-line attr applied past the end of the text.
    fn eol_attr(&mut self, _row: usize) -> Option<Attr> {
        None
    }
}

/// One sign mark. `text` is at most two cells wide.
#[derive(Debug, Clone)]
pub struct SignMark {
    pub text: String,
    pub attr: Attr,
    pub priority: u32,
    /// Attr for the number column when the sign claims it.
    pub number_attr: Option<Attr>,
    /// Whole-line attr contributed by the sign.
    pub line_attr: Option<Attr>,
    /// Replacement attr when the cursor line overlaps the sign column.
    pub cursorline_attr: Option<Attr>,
}

pub trait SignSource {
    /// Signs for the line, sorted by descending priority, at most
    /// [`SIGN_SHOW_MAX`].
    fn line_signs(&self, row: usize) -> Vec<SignMark>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FoldInfo {
    pub level: usize,
    /// Buffer lines covered when this line starts a closed fold; zero
    /// for open folds.
    pub lines: usize,
    /// Line where the innermost fold starts.
    pub start_row: usize,
    /// Lowest fold level that opens at this line.
    pub low_level: usize,
}

impl FoldInfo {
    pub fn is_closed(&self) -> bool {
        self.lines > 0
    }
}

pub trait FoldSource {
    fn info(&self, row: usize) -> FoldInfo;

    /// Replacement text for the body of a closed fold.
    fn fold_text(&self, row: usize, info: &FoldInfo) -> String {
        format!("+--{:>3} lines folded ", info.lines)
    }
}

/// Pre-rendered status column text with highlight breakpoints.
#[derive(Debug, Clone, Default)]
pub struct StatusColumnText {
    pub text: String,
    /// Cell width the text was built for.
    pub width: usize,
    /// `(byte offset, attr)` breakpoints; `None` attrs fall back to the
    /// line-number attr. Offsets are ascending; the first section
    /// implicitly starts at byte 0 with the number attr.
    pub segments: Vec<(usize, Option<Attr>)>,
    /// Cells that did not fit in `width`; non-zero forces the caller to
    /// retry the whole line with a wider column.
    pub truncated: usize,
}

pub trait StatusColumnSource {
    /// Build the status column text for `row`. `wrap_row` is 0 on the
    /// first text row, counting up on wrapped continuation rows, and -1
    /// style semantics are not used: filler rows pass `wrap_row == 0`
    /// with `rel_row == None`.
    fn build(
        &mut self,
        row: usize,
        rel_row: Option<usize>,
        wrap_row: usize,
        width: usize,
    ) -> Result<StatusColumnText>;
}

/// Destination for finished rows.
pub trait GridSink {
    /// Called exactly once per produced physical row, with cells already
    /// width- and order-correct for the window's text direction.
    fn commit_row(&mut self, screen_row: usize, cells: &[Cell], wrapped: bool) -> Result<()>;
}

/// The collaborator bundle for one `render_line` call. Absent
/// collaborators simply disable their feature.
#[derive(Default)]
pub struct Collaborators<'a> {
    pub syntax: Option<&'a mut dyn SyntaxSource>,
    pub spell: Option<&'a mut dyn SpellSource>,
    pub decor: Option<&'a mut dyn DecorSource>,
    pub signs: Option<&'a dyn SignSource>,
    pub folds: Option<&'a dyn FoldSource>,
    pub status_column: Option<&'a mut dyn StatusColumnSource>,
    /// Polled between physical rows; `true` stops the redraw.
    pub interrupt: Option<&'a dyn Fn() -> bool>,
}
