//! Decorations and whole-line painting: virtual text, virtual lines,
//! diff fillers and ranges, line attrs past end of line, color columns.

mod common;

use common::{StaticDecor, draw, rows_of};
use core_config::DisplayOptions;
use core_render::attr::Attr;
use core_render::providers::{Collaborators, VirtAnchor, VirtLine, VirtText};
use core_render::{Color, DiffContext, DiffKind, LineParams};

#[test]
fn eol_virtual_text_follows_the_text() {
    let mut decor = StaticDecor {
        virt_texts: vec![VirtText {
            chunks: vec![("note".to_string(), Attr::fg(Color::Green))],
            anchor: VirtAnchor::EndOfLine,
            combine: false,
        }],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"ab", 10);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(sink.text(0), "abnote    ");
    assert_eq!(sink.attrs(0)[2].fg, Some(Color::Green));
}

#[test]
fn win_col_virtual_text_overlays_text() {
    let mut decor = StaticDecor {
        virt_texts: vec![VirtText {
            chunks: vec![("XX".to_string(), Attr::fg(Color::Green))],
            anchor: VirtAnchor::WinCol(1),
            combine: false,
        }],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"abcdef", 10);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(sink.text(0), "aXXdef    ");
}

#[test]
fn right_aligned_virtual_text_hugs_the_edge() {
    let mut decor = StaticDecor {
        virt_texts: vec![VirtText {
            chunks: vec![("hi".to_string(), Attr::fg(Color::Green))],
            anchor: VirtAnchor::RightAlign,
            combine: false,
        }],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"ab", 8);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(sink.text(0), "ab    hi");
}

#[test]
fn virtual_line_renders_as_filler_row_above() {
    let mut decor = StaticDecor {
        virt_lines: vec![VirtLine {
            chunks: vec![("-- note --".to_string(), Attr::fg(Color::Green))],
            left_col: false,
        }],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"body", 12);
    let (outcome, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(rows_of(outcome), 2);
    assert_eq!(sink.text(0), "-- note --  ");
    assert_eq!(sink.text(1), "body        ");
    assert!(!sink.wrapped(0));
}

#[test]
fn diff_filler_rows_use_the_fill_char() {
    let mut params = LineParams::new(b"body", 6);
    params.filler_rows = 1;
    let opts = DisplayOptions::default();
    let (outcome, sink) = draw(&params, &opts, &mut Collaborators::default());
    assert_eq!(rows_of(outcome), 2);
    let fill: String = opts.fill_chars.diff.to_string().repeat(6);
    assert_eq!(sink.text(0), fill);
    assert_eq!(sink.attrs(0)[0].fg, Some(Color::DarkRed));
    assert_eq!(sink.text(1), "body  ");
}

#[test]
fn changed_line_switches_to_text_range_and_back() {
    let mut params = LineParams::new(b"hello world", 14);
    params.diff = Some(DiffContext {
        kind: DiffKind::Change,
        change_start: 6,
        change_end: 10,
    });
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert_eq!(attrs[0].bg, Some(Color::DarkYellow), "changed line");
    assert_eq!(attrs[6].bg, Some(Color::Yellow), "changed text");
    // Past end of line the changed-line attr continues.
    assert_eq!(attrs[12].bg, Some(Color::DarkYellow));
}

#[test]
fn added_line_attr_extends_past_eol() {
    let mut params = LineParams::new(b"new", 8);
    params.diff = Some(DiffContext {
        kind: DiffKind::Add,
        change_start: 0,
        change_end: 0,
    });
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert_eq!(attrs[0].bg, Some(Color::Green));
    assert_eq!(attrs[7].bg, Some(Color::Green));
}

#[test]
fn quickfix_current_line_painted_to_the_edge() {
    let mut params = LineParams::new(b"entry", 10);
    params.quickfix_current = true;
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert!(attrs.iter().all(|a| a.bg == Some(Color::DarkMagenta)));
}

#[test]
fn cursorline_background_covers_the_row() {
    let mut opts = DisplayOptions::default();
    opts.cursorline = true;
    let mut params = LineParams::new(b"here", 8);
    params.cursor_row = 0;
    let (_, sink) = draw(&params, &opts, &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert!(attrs.iter().all(|a| a.bg == Some(Color::Black)));
}

#[test]
fn color_column_marks_the_configured_column() {
    let mut opts = DisplayOptions::default();
    opts.color_columns = vec![4];
    let params = LineParams::new(b"abcdefgh", 10);
    let (_, sink) = draw(&params, &opts, &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert_eq!(attrs[3].bg, None);
    assert_eq!(attrs[4].bg, Some(Color::DarkRed));
    assert_eq!(attrs[5].bg, None);
}

#[test]
fn color_column_painted_past_short_lines() {
    let mut opts = DisplayOptions::default();
    opts.color_columns = vec![6];
    let params = LineParams::new(b"ab", 10);
    let (_, sink) = draw(&params, &opts, &mut Collaborators::default());
    assert_eq!(sink.attrs(0)[6].bg, Some(Color::DarkRed));
}

#[test]
fn terminal_attrs_combine_under_everything() {
    let term: Vec<Attr> = (0..8)
        .map(|i| {
            if i < 4 {
                Attr::bg(Color::Black)
            } else {
                Attr::EMPTY
            }
        })
        .collect();
    let mut params = LineParams::new(b"shell", 8);
    params.term_attrs = Some(&term);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut Collaborators::default());
    let attrs = sink.attrs(0);
    assert_eq!(attrs[0].bg, Some(Color::Black));
    assert_eq!(attrs[4].bg, None);
}

#[test]
fn decor_eol_attr_paints_the_tail() {
    let mut decor = StaticDecor {
        eol: Some(Attr::bg(Color::Red)),
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"ab", 6);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(sink.attrs(0)[4].bg, Some(Color::Red));
}

#[test]
fn decor_span_attr_combines_over_text() {
    let mut decor = StaticDecor {
        spans: vec![(0, 2, Attr::fg(Color::Green))],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"abcd", 6);
    let (_, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    assert_eq!(sink.attrs(0)[0].fg, Some(Color::Green));
    assert_eq!(sink.attrs(0)[2].fg, None);
}
