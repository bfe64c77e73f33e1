// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fortynine_proto::messages::ClaudeState;

use super::{classify_lines, classify_screen};

#[test]
fn numbered_permission_affirmative_wins() {
    let lines = vec![
        "Do you want to run this command?",
        "  1. Yes",
        "  2. Yes, and don't ask again",
        "  3. No",
    ];
    assert_eq!(classify_lines(&lines), ClaudeState::Permission);
}

#[test]
fn permission_outranks_question_chrome() {
    // Both the permission affirmative and "Esc to cancel" are on screen;
    // the permission rule is checked first.
    let lines = vec!["  2. Yes, allow all edits", "  Esc to cancel"];
    assert_eq!(classify_lines(&lines), ClaudeState::Permission);
}

#[test]
fn question_markers_classify_as_question() {
    assert_eq!(classify_lines(&["  Press Enter to continue"]), ClaudeState::Question);
    assert_eq!(classify_lines(&["Use Enter to select an option"]), ClaudeState::Question);
    assert_eq!(classify_lines(&["↑/↓ to navigate · esc to close"]), ClaudeState::Question);
    assert_eq!(classify_lines(&["press esc to cancel"]), ClaudeState::Question);
    assert_eq!(classify_lines(&["[use arrows to move]"]), ClaudeState::Question);
}

#[test]
fn spinner_footer_is_working() {
    assert_eq!(
        classify_lines(&["✶ Reticulating… (esc to interrupt)"]),
        ClaudeState::Working
    );
}

#[test]
fn prompt_line_is_idle() {
    assert_eq!(classify_lines(&["❯ "]), ClaudeState::Idle);
    assert_eq!(classify_lines(&["❯\u{00a0}try \"fix the tests\""]), ClaudeState::Idle);
}

#[test]
fn numbered_prompt_options_are_not_idle() {
    // "❯ 1. Dark mode" is a selected list row, not the input prompt.
    assert_eq!(classify_lines(&["❯ 1. Dark mode"]), ClaudeState::Working);
}

#[test]
fn bypass_permissions_splash_is_idle() {
    assert_eq!(
        classify_lines(&["  ⏵⏵ bypass permissions on (shift+tab to cycle)"]),
        ClaudeState::Idle
    );
}

#[test]
fn prose_mentioning_press_enter_mid_line_is_not_question() {
    // "Press Enter" must anchor at line start; conversational text that
    // mentions it does not reclassify the pane.
    let lines = vec!["I told the user to Press Enter earlier today"];
    assert_eq!(classify_lines(&lines), ClaudeState::Working);
}

#[test]
fn plain_output_defaults_to_working() {
    let lines = vec!["compiling fortynine v0.4.2", "warning: unused variable"];
    assert_eq!(classify_lines(&lines), ClaudeState::Working);
}

#[test]
fn only_last_twenty_nonblank_lines_are_scanned() {
    let mut screen = String::new();
    screen.push_str("  2. Yes, allow\n");
    for i in 0..30 {
        screen.push_str(&format!("output line {i}\n"));
    }
    // The permission line scrolled out of the scan window.
    assert_eq!(classify_screen(&screen), ClaudeState::Working);
}

#[test]
fn blank_lines_do_not_count_against_the_window() {
    let mut screen = String::new();
    screen.push_str("❯ \n");
    for _ in 0..40 {
        screen.push('\n');
    }
    assert_eq!(classify_screen(&screen), ClaudeState::Idle);
}
