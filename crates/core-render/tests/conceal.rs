//! Concealment: substitution modes, column accounting, the tab
//! reconciliation invariant, and toggling conceal off.

mod common;

use common::{StaticDecor, StaticSyntax, draw, rows_of};
use core_config::DisplayOptions;
use core_render::providers::{Collaborators, ConcealHint};
use core_render::{Color, LineParams};

/// "a secret b": the word "secret" (bytes 2..8) is one concealed item.
fn syntax_concealing(ch: Option<char>) -> StaticSyntax {
    StaticSyntax {
        conceal: vec![(2, 8, ch, 1)],
        ..StaticSyntax::default()
    }
}

#[test]
fn level_two_shows_one_substitute_per_item() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 2;
    let mut syntax = syntax_concealing(Some('*'));
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    assert!(sink.text(0).starts_with("a * b"));
    // The substitute carries the conceal attr.
    assert_eq!(sink.attrs(0)[2].fg, Some(Color::Grey));
}

#[test]
fn level_two_without_substitute_hides_item() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 2;
    let mut syntax = syntax_concealing(None);
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    assert!(sink.text(0).starts_with("a  b"));
}

#[test]
fn level_one_substitutes_a_blank() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 1;
    let mut syntax = syntax_concealing(None);
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    // One blank where the item started, then the rest of the line.
    assert!(sink.text(0).starts_with("a   b"));
}

#[test]
fn level_three_hides_without_substitute() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 3;
    let mut syntax = syntax_concealing(Some('*'));
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    assert!(sink.text(0).starts_with("a  b"));
}

#[test]
fn cursor_line_stays_unconcealed() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 2;
    let mut syntax = syntax_concealing(Some('*'));
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 0;
    params.row = 0;
    let (_, sink) = draw(&params, &opts, &mut collab);
    assert!(sink.text(0).starts_with("a secret b"));
}

#[test]
fn tab_after_concealed_run_keeps_alignment() {
    // The tab must land following text on the same physical column as
    // the unconcealed rendering: concealment may not shift tab stops.
    let mut opts = DisplayOptions::default();
    opts.tabstop = 4;
    opts.conceal_level = 3;
    let mut syntax = StaticSyntax {
        conceal: vec![(1, 2, None, 1)],
        ..StaticSyntax::default()
    };
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"ab\tx", 12);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    let concealed_row = sink.text(0);

    let plain_params = LineParams::new(b"ab\tx", 12);
    let (_, plain) = draw(&plain_params, &DisplayOptions::default(), &mut Collaborators::default());
    let plain_row = plain.text(0);
    assert_eq!(
        concealed_row.find('x'),
        plain_row.find('x'),
        "tab stop drifted: {concealed_row:?} vs {plain_row:?}"
    );
}

#[test]
fn toggling_conceal_off_restores_plain_rendering() {
    let mut on = DisplayOptions::default();
    on.conceal_level = 2;
    let mut off = DisplayOptions::default();
    off.conceal_level = 0;

    let mut syntax = syntax_concealing(Some('*'));
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;

    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let (_, _) = draw(&params, &on, &mut collab);

    let mut syntax2 = syntax_concealing(Some('*'));
    let mut collab_off = Collaborators {
        syntax: Some(&mut syntax2),
        ..Collaborators::default()
    };
    let (_, after_toggle) = draw(&params, &off, &mut collab_off);
    let (_, plain) = draw(&params, &off, &mut Collaborators::default());
    assert_eq!(after_toggle.text(0), plain.text(0));
}

#[test]
fn decor_conceal_uses_item_char_and_attr() {
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 2;
    let mut decor = StaticDecor {
        conceal: vec![(2, 8, ConcealHint::Char('•'), 7)],
        ..StaticDecor::default()
    };
    let mut collab = Collaborators {
        decor: Some(&mut decor),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"a secret b", 16);
    params.cursor_row = 99;
    let (_, sink) = draw(&params, &opts, &mut collab);
    assert!(sink.text(0).starts_with("a • b"));
}

#[test]
fn concealed_wide_text_still_wraps_at_the_same_point() {
    // Concealed columns count toward wrap geometry ("bogus" cells), so
    // a concealed run does not pull extra text onto the row.
    let mut opts = DisplayOptions::default();
    opts.conceal_level = 3;
    let mut syntax = StaticSyntax {
        conceal: vec![(0, 4, None, 1)],
        ..StaticSyntax::default()
    };
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let mut params = LineParams::new(b"aaaabbbb", 6);
    params.cursor_row = 99;
    let (outcome, sink) = draw(&params, &opts, &mut collab);
    // 4 concealed + 2 visible fill the first row's geometry.
    assert_eq!(rows_of(outcome), 2);
    assert!(sink.text(0).starts_with("bb"));
    assert!(sink.text(1).starts_with("bb"));
}
