// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Screen-scrape classification of a Claude CLI pane.
//!
//! Operates on the last 20 non-blank lines of the visible screen. Rules are
//! ordered; the anchored patterns must stay line-start anchored to avoid
//! false positives in conversational text.

use std::sync::LazyLock;

use regex::Regex;

use fortynine_proto::messages::ClaudeState;

/// Lines inspected from the bottom of the screen.
const SCAN_LINES: usize = 20;

static PERMISSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*2\.\s+Yes,\s").ok());

static QUESTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\s*Press Enter",
        r"(?i)Enter to select",
        r"(?i)Esc to cancel",
        r"(?i)\[use arrows",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static WORKING_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)esc to interrupt").ok());

static SPLASH_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)⏵⏵\s*bypass permissions").ok());

/// Classify a captured screen.
pub fn classify_screen(screen: &str) -> ClaudeState {
    let lines: Vec<&str> = screen
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(SCAN_LINES);
    classify_lines(&lines[start..])
}

/// Classify the last non-blank lines of a pane, in rule order.
pub fn classify_lines(lines: &[&str]) -> ClaudeState {
    // 1. Numbered permission affirmative ("2. Yes, ...").
    if let Some(re) = PERMISSION_RE.as_ref() {
        if lines.iter().any(|l| re.is_match(l)) {
            return ClaudeState::Permission;
        }
    }

    // 2. Interactive question chrome.
    let question = lines.iter().any(|l| {
        QUESTION_RES.iter().any(|re| re.is_match(l)) || l.contains("↑/↓ to navigate")
    });
    if question {
        return ClaudeState::Question;
    }

    // 3. Busy spinner footer.
    if let Some(re) = WORKING_RE.as_ref() {
        if lines.iter().any(|l| re.is_match(l)) {
            return ClaudeState::Working;
        }
    }

    // 4. Idle: shell-style prompt or the bypass-permissions splash.
    let idle_prompt = lines.iter().any(|l| is_idle_prompt(l));
    let splash = SPLASH_RE
        .as_ref()
        .map(|re| lines.iter().any(|l| re.is_match(l)))
        .unwrap_or(false);
    if idle_prompt || splash {
        return ClaudeState::Idle;
    }

    // 5. Anything else is mid-task output.
    ClaudeState::Working
}

/// Line-start `❯` followed by a space (or NBSP) and then not a digit.
/// The digit guard keeps numbered option lists from reading as idle.
fn is_idle_prompt(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('\u{276f}') else {
        return false;
    };
    let mut chars = rest.chars();
    match chars.next() {
        Some(' ') | Some('\u{00a0}') => {}
        _ => return false,
    }
    !chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
