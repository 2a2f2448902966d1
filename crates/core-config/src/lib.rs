//! Display configuration loading and resolution.
//!
//! Parses `patina.toml` (or an override path supplied by the embedding
//! binary) into the per-window [`DisplayOptions`] the renderer consumes.
//! Unknown fields are ignored so the file format can grow without
//! breaking older builds. Raw parsed values are retained on [`Config`] so
//! they can be re-clamped when the viewport geometry changes.
//!
//! The option set mirrors the display options of the original editor:
//! wrapping, number/relative-number, sign and fold columns, the
//! user-programmable status column, break-indent/show-break, list mode
//! with its marker characters, fill characters, concealment, and
//! right-to-left layout with Arabic shaping.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// Hard cap for the number column, matching the widest count of digits a
/// line number plus separator can reasonably need.
pub const MAX_NUMBER_WIDTH: usize = 20;

/// Most sign-column segments drawn side by side.
pub const MAX_SIGN_COLUMNS: usize = 9;

/// Widest fold indicator column.
pub const MAX_FOLD_COLUMN: usize = 9;

fn first_char(s: &str) -> Option<char> {
    s.chars().next()
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListCharsSection {
    /// Two or three chars: head, fill, and optionally a distinct tail.
    #[serde(default)]
    pub tab: Option<String>,
    #[serde(default)]
    pub trail: Option<String>,
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub space: Option<String>,
    #[serde(default)]
    pub multispace: Option<String>,
    #[serde(default)]
    pub lead_multispace: Option<String>,
    #[serde(default)]
    pub nbsp: Option<String>,
    #[serde(default)]
    pub eol: Option<String>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub precedes: Option<String>,
    #[serde(default)]
    pub conceal: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct FillCharsSection {
    #[serde(default)]
    pub fold: Option<String>,
    #[serde(default)]
    pub fold_open: Option<String>,
    #[serde(default)]
    pub fold_closed: Option<String>,
    #[serde(default)]
    pub fold_sep: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub eob: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CursorLineSection {
    #[serde(default = "CursorLineSection::default_true")]
    pub line: bool,
    #[serde(default = "CursorLineSection::default_true")]
    pub number: bool,
    #[serde(default)]
    pub screenline: bool,
}

impl CursorLineSection {
    fn default_true() -> bool {
        true
    }
}

impl Default for CursorLineSection {
    fn default() -> Self {
        Self {
            line: true,
            number: true,
            screenline: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySection {
    #[serde(default = "DisplaySection::default_wrap")]
    pub wrap: bool,
    #[serde(default)]
    pub number: bool,
    #[serde(default)]
    pub relative_number: bool,
    #[serde(default = "DisplaySection::default_number_width")]
    pub number_width: usize,
    #[serde(default)]
    pub sign_columns: usize,
    #[serde(default)]
    pub signs_in_number_column: bool,
    #[serde(default)]
    pub fold_column: usize,
    #[serde(default)]
    pub status_column: bool,
    #[serde(default)]
    pub break_indent: bool,
    /// Draw the break indent after the show-break marker instead of
    /// before it.
    #[serde(default)]
    pub break_indent_after_break: bool,
    #[serde(default)]
    pub show_break: String,
    #[serde(default = "DisplaySection::default_tabstop")]
    pub tabstop: usize,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub list_chars: ListCharsSection,
    #[serde(default)]
    pub fill_chars: FillCharsSection,
    #[serde(default)]
    pub conceal_level: u8,
    #[serde(default)]
    pub rightleft: bool,
    #[serde(default = "DisplaySection::default_arabic_shape")]
    pub arabic_shape: bool,
    #[serde(default)]
    pub cursorline: bool,
    #[serde(default)]
    pub cursorline_opt: CursorLineSection,
    #[serde(default)]
    pub cursor_column: bool,
    #[serde(default)]
    pub color_columns: Vec<usize>,
}

impl DisplaySection {
    fn default_wrap() -> bool {
        true
    }
    fn default_number_width() -> usize {
        4
    }
    fn default_tabstop() -> usize {
        8
    }
    fn default_arabic_shape() -> bool {
        true
    }
}

impl Default for DisplaySection {
    // Must stay in agreement with the serde defaults above.
    fn default() -> Self {
        Self {
            wrap: Self::default_wrap(),
            number: false,
            relative_number: false,
            number_width: Self::default_number_width(),
            sign_columns: 0,
            signs_in_number_column: false,
            fold_column: 0,
            status_column: false,
            break_indent: false,
            break_indent_after_break: false,
            show_break: String::new(),
            tabstop: Self::default_tabstop(),
            list: false,
            list_chars: ListCharsSection::default(),
            fill_chars: FillCharsSection::default(),
            conceal_level: 0,
            rightleft: false,
            arabic_shape: Self::default_arabic_shape(),
            cursorline: false,
            cursorline_opt: CursorLineSection::default(),
            cursor_column: false,
            color_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub display: DisplaySection,
}

/// Resolved per-window marker characters for 'list' mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListChars {
    pub tab_head: Option<char>,
    pub tab_fill: Option<char>,
    pub tab_tail: Option<char>,
    pub trail: Option<char>,
    pub lead: Option<char>,
    pub space: Option<char>,
    pub multispace: Option<Vec<char>>,
    pub lead_multispace: Option<Vec<char>>,
    pub nbsp: Option<char>,
    pub eol: Option<char>,
    pub extends: Option<char>,
    pub precedes: Option<char>,
    pub conceal: Option<char>,
}

/// Resolved fill characters for synthetic regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillChars {
    pub fold: char,
    pub fold_open: char,
    pub fold_closed: char,
    pub fold_sep: char,
    pub diff: char,
    pub eob: char,
}

impl Default for FillChars {
    fn default() -> Self {
        Self {
            fold: '·',
            fold_open: '-',
            fold_closed: '+',
            fold_sep: '│',
            diff: '-',
            eob: '~',
        }
    }
}

/// Cursor-line scope flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorLineOpt {
    pub line: bool,
    pub number: bool,
    pub screenline: bool,
}

impl Default for CursorLineOpt {
    fn default() -> Self {
        Self {
            line: true,
            number: true,
            screenline: false,
        }
    }
}

/// The per-window option set the renderer consumes. All values are
/// already clamped; the renderer never validates them again.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub wrap: bool,
    pub number: bool,
    pub relative_number: bool,
    pub number_width: usize,
    pub sign_columns: usize,
    pub signs_in_number_column: bool,
    pub fold_column: usize,
    pub status_column: bool,
    pub break_indent: bool,
    pub break_indent_after_break: bool,
    pub show_break: String,
    pub tabstop: usize,
    pub list: bool,
    pub list_chars: ListChars,
    pub fill_chars: FillChars,
    pub conceal_level: u8,
    pub rightleft: bool,
    pub arabic_shape: bool,
    pub cursorline: bool,
    pub cursorline_opt: CursorLineOpt,
    pub cursor_column: bool,
    pub color_columns: Vec<usize>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplaySection::default().resolve()
    }
}

impl DisplaySection {
    fn resolve(&self) -> DisplayOptions {
        let lc = &self.list_chars;
        let tab: Vec<char> = lc.tab.as_deref().unwrap_or("").chars().collect();
        let list_chars = ListChars {
            tab_head: tab.first().copied(),
            tab_fill: tab.get(1).copied(),
            tab_tail: tab.get(2).copied(),
            trail: lc.trail.as_deref().and_then(first_char),
            lead: lc.lead.as_deref().and_then(first_char),
            space: lc.space.as_deref().and_then(first_char),
            multispace: lc
                .multispace
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.chars().collect()),
            lead_multispace: lc
                .lead_multispace
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.chars().collect()),
            nbsp: lc.nbsp.as_deref().and_then(first_char),
            eol: lc.eol.as_deref().and_then(first_char),
            extends: lc.extends.as_deref().and_then(first_char),
            precedes: lc.precedes.as_deref().and_then(first_char),
            conceal: lc.conceal.as_deref().and_then(first_char),
        };
        let defaults = FillChars::default();
        let fc = &self.fill_chars;
        let fill_chars = FillChars {
            fold: fc.fold.as_deref().and_then(first_char).unwrap_or(defaults.fold),
            fold_open: fc
                .fold_open
                .as_deref()
                .and_then(first_char)
                .unwrap_or(defaults.fold_open),
            fold_closed: fc
                .fold_closed
                .as_deref()
                .and_then(first_char)
                .unwrap_or(defaults.fold_closed),
            fold_sep: fc
                .fold_sep
                .as_deref()
                .and_then(first_char)
                .unwrap_or(defaults.fold_sep),
            diff: fc.diff.as_deref().and_then(first_char).unwrap_or(defaults.diff),
            eob: fc.eob.as_deref().and_then(first_char).unwrap_or(defaults.eob),
        };
        DisplayOptions {
            wrap: self.wrap,
            number: self.number,
            relative_number: self.relative_number,
            number_width: self.number_width.clamp(1, MAX_NUMBER_WIDTH),
            sign_columns: self.sign_columns.min(MAX_SIGN_COLUMNS),
            signs_in_number_column: self.signs_in_number_column,
            fold_column: self.fold_column.min(MAX_FOLD_COLUMN),
            status_column: self.status_column,
            break_indent: self.break_indent,
            break_indent_after_break: self.break_indent_after_break,
            show_break: self.show_break.clone(),
            tabstop: self.tabstop.max(1),
            list: self.list,
            list_chars,
            fill_chars,
            conceal_level: self.conceal_level.min(3),
            rightleft: self.rightleft,
            arabic_shape: self.arabic_shape,
            cursorline: self.cursorline,
            cursorline_opt: CursorLineOpt {
                line: self.cursorline_opt.line,
                number: self.cursorline_opt.number,
                screenline: self.cursorline_opt.screenline,
            },
            cursor_column: self.cursor_column,
            color_columns: {
                let mut cols = self.color_columns.clone();
                cols.sort_unstable();
                cols.dedup();
                cols
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file contents, kept for diagnostics.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("patina").join("patina.toml"))
    }

    /// Load from `path`, or the default location when `None`. A missing
    /// file is not an error; it yields the defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path.or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_str(&raw)?;
        info!(path = %path.display(), "loaded display config");
        Ok(cfg)
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw).context("parsing config")?;
        Ok(Self {
            raw: Some(raw.to_string()),
            file,
        })
    }

    /// Resolve to the option set the renderer consumes.
    pub fn display_options(&self) -> DisplayOptions {
        self.file.display.resolve()
    }
}
