//! Visual attributes and their combination algebra.
//!
//! Every cell ends up with exactly one resolved [`Attr`]. Highlight
//! sources never replace each other wholesale; they are layered with
//! [`Attr::combine`], where the overlay's defined fields win and
//! undefined fields fall through to the base. This is what lets a
//! background-only cursor-line attr shine through syntax foregrounds,
//! and a foreground-defining one take precedence.
//!
//! [`Theme`] maps the renderer's own highlight groups (gutter pieces,
//! markers, conceal, diff, spell) to attrs. Collaborator-owned
//! highlighting (syntax, decorations, signs, status column) arrives as
//! ready-made `Attr` values and never goes through the theme.

use bitflags::bitflags;
// Re-exported so embedders build attrs without naming the terminal
// crate themselves.
pub use crossterm::style::Color;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttrFlags: u8 {
        const BOLD          = 0b0000_0001;
        const ITALIC        = 0b0000_0010;
        const UNDERLINE     = 0b0000_0100;
        const UNDERCURL     = 0b0000_1000;
        const REVERSE       = 0b0001_0000;
        const STRIKETHROUGH = 0b0010_0000;
    }
}

/// A resolved visual attribute. `None` means "not set here"; the lower
/// layer (ultimately the terminal default) shows through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub flags: AttrFlags,
}

impl Attr {
    pub const EMPTY: Attr = Attr {
        fg: None,
        bg: None,
        flags: AttrFlags::empty(),
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn fg(color: Color) -> Self {
        Attr {
            fg: Some(color),
            ..Self::EMPTY
        }
    }

    pub fn bg(color: Color) -> Self {
        Attr {
            bg: Some(color),
            ..Self::EMPTY
        }
    }

    pub fn with_flags(mut self, flags: AttrFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Layer `over` on top of `base`. Fields defined by `over` win,
    /// undefined fields fall through; style flags accumulate.
    pub fn combine(base: Attr, over: Attr) -> Attr {
        Attr {
            fg: over.fg.or(base.fg),
            bg: over.bg.or(base.bg),
            flags: base.flags | over.flags,
        }
    }

    /// `combine` over an optional base, for call sites holding
    /// `Option<Attr>` layers.
    pub fn combine_opt(base: Option<Attr>, over: Attr) -> Attr {
        Self::combine(base.unwrap_or(Attr::EMPTY), over)
    }
}

/// Highlight groups owned by the renderer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlGroup {
    /// Fold indicator column.
    FoldColumn,
    CursorLineFold,
    SignColumn,
    CursorLineSign,
    LineNr,
    LineNrAbove,
    LineNrBelow,
    CursorLineNr,
    /// Markers that are not buffer text: show-break, overflow `>`,
    /// `extends`/`precedes`, the half-wide `<` filler.
    NonText,
    /// 'list' mode whitespace markers.
    Whitespace,
    /// Escape forms of unprintable characters (`^X`, `<xx>`).
    SpecialKey,
    /// Escape forms of bytes that are not valid UTF-8.
    IllegalByte,
    Conceal,
    /// Closed-fold text line.
    Folded,
    Visual,
    Search,
    CursorLine,
    DiffAdd,
    DiffChange,
    DiffText,
    DiffDelete,
    QuickFixLine,
    SpellBad,
    SpellCap,
    SpellRare,
    SpellLocal,
    CursorColumn,
    ColorColumn,
}

impl HlGroup {
    pub const ALL: [HlGroup; 28] = [
        HlGroup::FoldColumn,
        HlGroup::CursorLineFold,
        HlGroup::SignColumn,
        HlGroup::CursorLineSign,
        HlGroup::LineNr,
        HlGroup::LineNrAbove,
        HlGroup::LineNrBelow,
        HlGroup::CursorLineNr,
        HlGroup::NonText,
        HlGroup::Whitespace,
        HlGroup::SpecialKey,
        HlGroup::IllegalByte,
        HlGroup::Conceal,
        HlGroup::Folded,
        HlGroup::Visual,
        HlGroup::Search,
        HlGroup::CursorLine,
        HlGroup::DiffAdd,
        HlGroup::DiffChange,
        HlGroup::DiffText,
        HlGroup::DiffDelete,
        HlGroup::QuickFixLine,
        HlGroup::SpellBad,
        HlGroup::SpellCap,
        HlGroup::SpellRare,
        HlGroup::SpellLocal,
        HlGroup::CursorColumn,
        HlGroup::ColorColumn,
    ];
}

/// Attr table for the renderer-owned groups. Defaults to all-empty so a
/// themeless embedding still renders correct text.
#[derive(Debug, Clone)]
pub struct Theme {
    attrs: [Attr; HlGroup::ALL.len()],
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            attrs: [Attr::EMPTY; HlGroup::ALL.len()],
        }
    }
}

impl Theme {
    pub fn get(&self, group: HlGroup) -> Attr {
        self.attrs[group as usize]
    }

    pub fn set(&mut self, group: HlGroup, attr: Attr) {
        self.attrs[group as usize] = attr;
    }

    /// Builder-style variant of [`Theme::set`].
    pub fn with(mut self, group: HlGroup, attr: Attr) -> Self {
        self.set(group, attr);
        self
    }
}
