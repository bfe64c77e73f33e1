// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{resolve_working_dir, TerminalRecord, TerminalsDoc, SCROLL_CLAMP};
use crate::state_dir::home_dir;

#[test]
fn working_dir_defaults_to_home() -> anyhow::Result<()> {
    let home = home_dir()?;
    assert_eq!(resolve_working_dir("")?, home);
    assert_eq!(resolve_working_dir("~")?, home);
    Ok(())
}

#[test]
fn tilde_expands_under_home() -> anyhow::Result<()> {
    let home = home_dir()?;
    assert_eq!(resolve_working_dir("~/projects/x")?, home.join("projects/x"));
    Ok(())
}

#[test]
fn tmp_is_permitted() -> anyhow::Result<()> {
    assert_eq!(resolve_working_dir("/tmp/scratch")?.to_str(), Some("/tmp/scratch"));
    Ok(())
}

#[test]
fn paths_outside_home_and_tmp_are_rejected() {
    assert!(resolve_working_dir("/etc").is_err());
    assert!(resolve_working_dir("/var/log").is_err());
}

#[test]
fn scroll_clamp_bounds_requests() {
    assert_eq!(40i32.clamp(-SCROLL_CLAMP, SCROLL_CLAMP), 15);
    assert_eq!((-40i32).clamp(-SCROLL_CLAMP, SCROLL_CLAMP), -15);
    assert_eq!(7i32.clamp(-SCROLL_CLAMP, SCROLL_CLAMP), 7);
}

#[test]
fn terminals_doc_round_trips() -> anyhow::Result<()> {
    let mut doc = TerminalsDoc::default();
    doc.terminals.insert(
        "ab12".to_owned(),
        TerminalRecord {
            id: "ab12".to_owned(),
            session_name: "tc2-ab12".to_owned(),
            working_dir: "/tmp".to_owned(),
            device: "host-1".to_owned(),
        },
    );
    let text = serde_json::to_string(&doc)?;
    let parsed: TerminalsDoc = serde_json::from_str(&text)?;
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.terminals, doc.terminals);

    // Wire fields are camelCase for the browser.
    assert!(text.contains("\"sessionName\""));
    assert!(text.contains("\"workingDir\""));
    Ok(())
}
