//! Failure policy: collaborator errors degrade one feature for the
//! rest of the line without losing the line itself.

mod common;

use common::{StaticSyntax, draw};
use core_config::DisplayOptions;
use core_render::attr::Attr;
use core_render::providers::Collaborators;
use core_render::{Color, LineOutcome, LineParams};

#[test]
fn syntax_error_disables_highlighting_mid_line() {
    let mut syntax = StaticSyntax {
        spans: vec![(0, 6, Attr::fg(Color::Green))],
        fail_from: Some(3),
        ..StaticSyntax::default()
    };
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"abcdef", 8);
    let (outcome, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    match outcome {
        LineOutcome::Drawn(d) => assert!(d.syntax_degraded),
        other => panic!("unexpected outcome {other:?}"),
    }
    // The text itself is intact.
    assert_eq!(sink.text(0), "abcdef  ");
    let attrs = sink.attrs(0);
    assert_eq!(attrs[0].fg, Some(Color::Green));
    assert_eq!(attrs[2].fg, Some(Color::Green));
    // From the failing query onward, no syntax attrs.
    assert_eq!(attrs[3].fg, None);
    assert_eq!(attrs[5].fg, None);
}

#[test]
fn degraded_line_still_reports_row_count() {
    let mut syntax = StaticSyntax {
        fail_from: Some(0),
        ..StaticSyntax::default()
    };
    let mut collab = Collaborators {
        syntax: Some(&mut syntax),
        ..Collaborators::default()
    };
    let params = LineParams::new(b"abcdefgh", 4);
    let (outcome, sink) = draw(&params, &DisplayOptions::default(), &mut collab);
    match outcome {
        LineOutcome::Drawn(d) => {
            assert!(d.syntax_degraded);
            assert_eq!(d.rows, 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(sink.rows.len(), 2);
}
