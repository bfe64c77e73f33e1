// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::TempDir;

use super::{
    encode_cwd, first_user_message, latest_custom_title, transcript_path, SessionIdCache,
    SessionNameCache,
};

#[test]
fn cwd_encoding_is_hyphenated() {
    assert_eq!(encode_cwd("/home/u/proj"), "-home-u-proj");
    assert_eq!(encode_cwd("/home/u/my.app"), "-home-u-my-app");
}

#[test]
fn transcript_path_joins_encoded_cwd_and_session_id() {
    let path = transcript_path(std::path::Path::new("/p"), "/home/u/x", "abc123");
    assert_eq!(path.to_str(), Some("/p/-home-u-x/abc123.jsonl"));
}

#[test]
fn latest_custom_title_wins_over_earlier_ones() {
    let tail = concat!(
        r#"{"type":"custom-title","title":"first title"}"#,
        "\n",
        r#"{"type":"assistant","message":{}}"#,
        "\n",
        r#"{"type":"custom-title","title":"second title"}"#,
        "\n",
    );
    assert_eq!(latest_custom_title(tail).as_deref(), Some("second title"));
}

#[test]
fn user_message_filters_markup_and_short_text() {
    let head = concat!(
        r#"{"type":"user","message":{"content":"<system>injected</system>"}}"#,
        "\n",
        r#"{"type":"user","message":{"content":"[ctx] note"}}"#,
        "\n",
        r#"{"type":"user","message":{"content":"ok"}}"#,
        "\n",
        r#"{"type":"user","message":{"content":"fix the flaky retry test"}}"#,
        "\n",
    );
    assert_eq!(first_user_message(head).as_deref(), Some("fix the flaky retry test"));
}

#[test]
fn user_message_reads_content_block_arrays() {
    let head = concat!(
        r#"{"type":"user","message":{"content":[{"type":"text","text":"rename the config module"}]}}"#,
        "\n",
    );
    assert_eq!(first_user_message(head).as_deref(), Some("rename the config module"));
}

#[test]
fn long_names_trim_to_one_hundred_chars() {
    let long = "x".repeat(300);
    let head = format!(r#"{{"type":"user","message":{{"content":"{long}"}}}}"#);
    let name = first_user_message(&head).unwrap_or_default();
    assert_eq!(name.chars().count(), 100);
}

#[tokio::test]
async fn session_id_scan_matches_pid_marker_in_tail() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    std::fs::write(tmp.path().join("aaa-session.txt"), "noise tmp.999. noise")?;
    std::fs::write(tmp.path().join("bbb-session.txt"), "noise tmp.1234. noise")?;
    std::fs::write(tmp.path().join("ignored.log"), "tmp.1234.")?;

    let mut cache = SessionIdCache::default();
    let found = cache.lookup(1234, tmp.path()).await;
    assert_eq!(found.as_deref(), Some("bbb-session"));
    Ok(())
}

#[tokio::test]
async fn session_id_misses_are_cached() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut cache = SessionIdCache::default();
    assert_eq!(cache.lookup(77, tmp.path()).await, None);

    // The marker appears after the first scan; within the TTL the cached
    // null suppresses a rescan.
    std::fs::write(tmp.path().join("late.txt"), "tmp.77.")?;
    assert_eq!(cache.lookup(77, tmp.path()).await, None);
    Ok(())
}

#[tokio::test]
async fn session_name_prefers_custom_title() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join(encode_cwd("/home/u/proj"));
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join("sess-1.jsonl"),
        concat!(
            r#"{"type":"user","message":{"content":"original ask"}}"#,
            "\n",
            r#"{"type":"custom-title","title":"Retry storm fix"}"#,
            "\n",
        ),
    )?;

    let mut cache = SessionNameCache::default();
    let name = cache.resolve(tmp.path(), "/home/u/proj", "sess-1").await;
    assert_eq!(name.as_deref(), Some("Retry storm fix"));
    Ok(())
}

#[tokio::test]
async fn session_name_is_not_reread_within_the_interval() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join(encode_cwd("/home/u/p"));
    std::fs::create_dir_all(&dir)?;
    let transcript = dir.join("sess-2.jsonl");
    std::fs::write(&transcript, r#"{"type":"custom-title","title":"before"}"#)?;

    let mut cache = SessionNameCache::default();
    assert_eq!(
        cache.resolve(tmp.path(), "/home/u/p", "sess-2").await.as_deref(),
        Some("before")
    );

    // Even though the transcript changed, the minimum re-read interval has
    // not elapsed; the cached name is returned.
    std::fs::write(&transcript, r#"{"type":"custom-title","title":"after"}"#)?;
    assert_eq!(
        cache.resolve(tmp.path(), "/home/u/p", "sess-2").await.as_deref(),
        Some("before")
    );
    Ok(())
}
