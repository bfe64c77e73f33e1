// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{HashMap, HashSet};

use super::{
    ansi_to_html, choose_primary_branch, count_porcelain, label_tags, parse_hash_ages,
    parse_status_summary, relative_age, render_graph_html, strip_ansi,
};

#[test]
fn porcelain_counts_staged_unstaged_untracked() {
    let output = "M  staged.rs\n M unstaged.rs\nMM both.rs\n?? new.rs\nA  added.rs\n";
    assert_eq!(count_porcelain(output), (3, 2, 1));
}

#[test]
fn porcelain_empty_is_clean() {
    assert_eq!(count_porcelain(""), (0, 0, 0));
}

#[test]
fn primary_branch_prefers_main_then_master() {
    let branches = vec!["dev".to_owned(), "master".to_owned(), "main".to_owned()];
    assert_eq!(choose_primary_branch(&branches, "dev"), "main");

    let branches = vec!["dev".to_owned(), "master".to_owned()];
    assert_eq!(choose_primary_branch(&branches, "dev"), "master");

    let branches = vec!["trunk".to_owned()];
    assert_eq!(choose_primary_branch(&branches, "trunk"), "trunk");
}

#[test]
fn relative_ages() {
    let now = 1_000_000;
    assert_eq!(relative_age(now, now - 10), "1m");
    assert_eq!(relative_age(now, now - 300), "5m");
    assert_eq!(relative_age(now, now - 7200), "2h");
    assert_eq!(relative_age(now, now - 3 * 86400), "3d");
    // Clock skew never yields negative ages.
    assert_eq!(relative_age(now, now + 500), "1m");
}

#[test]
fn hash_age_lines_parse() {
    let ages = parse_hash_ages("abc1234 1700000000\ndef5678 1700000100\n");
    assert_eq!(ages.get("abc1234"), Some(&1_700_000_000));
    assert_eq!(ages.len(), 2);
}

#[test]
fn ansi_stripping() {
    assert_eq!(strip_ansi("\u{1b}[31mred\u{1b}[0m plain"), "red plain");
    assert_eq!(strip_ansi("no escapes"), "no escapes");
}

#[test]
fn ansi_to_html_escapes_and_colors() {
    let html = ansi_to_html("\u{1b}[33mabc1234\u{1b}[0m <fix>");
    assert!(html.contains("<span class=\"ansi-33\">abc1234</span>"));
    assert!(html.contains("&lt;fix&gt;"));
    assert!(!html.contains("<fix>"));
}

#[test]
fn tag_decorations_get_labels() {
    let line = "abc1234 (HEAD -> main, tag: v1.2.0) release";
    let labeled = label_tags(line);
    assert!(labeled.contains("<span class=\"tag\">v1.2.0</span>"));
}

#[test]
fn graph_lines_are_enriched() {
    let mut ages = HashMap::new();
    ages.insert("abc1234".to_owned(), 1_700_000_000i64);
    ages.insert("def5678".to_owned(), 1_700_000_000i64);
    let primary: HashSet<String> = ["abc1234".to_owned()].into_iter().collect();
    let ahead: HashSet<String> = ["def5678".to_owned()].into_iter().collect();
    let behind = HashSet::new();
    let now = 1_700_003_600i64;

    let graph = "* abc1234 trunk commit\n* def5678 local only commit\n";
    let html = render_graph_html(graph, &ages, &primary, &ahead, &behind, now);

    assert!(html.starts_with("<pre class=\"git-graph\">"));
    assert!(html.contains("<span class=\"node node-primary\">abc1234</span>"));
    assert!(html.contains("<span class=\"node node-branch\">def5678</span>"));
    // One hour old.
    assert!(html.contains("<span class=\"age\">1h</span>"));
    // Local-only commits carry the up indicator, synced ones a blank column.
    assert!(html.contains("<span class=\"indicator\">↑</span>"));
    assert!(html.contains("<span class=\"indicator\"> </span>"));
}

#[test]
fn status_summary_parses_branch_and_divergence() {
    let output = "## main...origin/main [ahead 2, behind 1]\nM  a.rs\n?? b.rs\n";
    let summary = parse_status_summary(output);
    assert_eq!(summary.branch, "main");
    assert_eq!(summary.ahead, 2);
    assert_eq!(summary.behind, 1);
    assert_eq!(summary.staged, 1);
    assert_eq!(summary.untracked, 1);
}

#[test]
fn status_summary_without_upstream() {
    let summary = parse_status_summary("## feature/x\n");
    assert_eq!(summary.branch, "feature/x");
    assert_eq!(summary.ahead, 0);
    assert_eq!(summary.behind, 0);
}
