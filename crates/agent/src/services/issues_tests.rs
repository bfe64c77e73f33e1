// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{close, create, valid_issue_id};

#[test]
fn issue_ids_allow_word_chars_and_dashes() {
    assert!(valid_issue_id("bd-123"));
    assert!(valid_issue_id("ISSUE_42"));
    assert!(valid_issue_id("a"));
}

#[test]
fn issue_ids_reject_everything_else() {
    assert!(!valid_issue_id(""));
    assert!(!valid_issue_id("bd 123"));
    assert!(!valid_issue_id("x;rm -rf /"));
    assert!(!valid_issue_id("a/b"));
    assert!(!valid_issue_id("id$(cmd)"));
}

#[tokio::test]
async fn close_refuses_invalid_id_before_any_subprocess() {
    // The binary name would fail anyway, but an invalid id must not even
    // get that far.
    let err = close(std::path::Path::new("/nonexistent"), "bad id").await;
    let err = match err {
        Err(e) => e.to_string(),
        Ok(_) => String::new(),
    };
    assert!(err.contains("invalid issue id"), "unexpected: {err}");
}

#[tokio::test]
async fn create_validates_inputs_first() {
    let dir = std::path::Path::new("/nonexistent");
    assert!(create(dir, "", "task", 1).await.is_err());
    assert!(create(dir, "t", "epic", 1).await.is_err());
    assert!(create(dir, "t", "bug", 9).await.is_err());
}
