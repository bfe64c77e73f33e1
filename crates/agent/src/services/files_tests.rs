// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::TempDir;

use super::{browse, create_file, delete, expand_path, mkdir, rename, sort_entries, DirEntryInfo};

fn entry(name: &str, is_dir: bool) -> DirEntryInfo {
    DirEntryInfo {
        name: name.to_owned(),
        path: format!("/x/{name}"),
        is_directory: is_dir,
        size: if is_dir { None } else { Some(0) },
    }
}

#[test]
fn directories_sort_before_files_then_alphabetical() {
    let mut entries = vec![
        entry("zeta.txt", false),
        entry("Alpha", true),
        entry("beta.txt", false),
        entry("gamma", true),
    ];
    sort_entries(&mut entries);
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "gamma", "beta.txt", "zeta.txt"]);
}

#[test]
fn tilde_expansion() -> anyhow::Result<()> {
    let home = crate::state_dir::home_dir()?;
    assert_eq!(expand_path("~")?, home);
    assert_eq!(expand_path("~/notes.md")?, home.join("notes.md"));
    assert_eq!(expand_path("/tmp/x")?.to_str(), Some("/tmp/x"));
    assert!(expand_path("").is_err());
    Ok(())
}

#[tokio::test]
async fn browse_hides_dotfiles_by_default() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    std::fs::write(tmp.path().join("visible.txt"), "x")?;
    std::fs::write(tmp.path().join(".hidden"), "x")?;
    std::fs::create_dir(tmp.path().join(".git"))?;

    let path = tmp.path().to_string_lossy().into_owned();
    let entries = browse(&path, false).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "visible.txt");

    let all = browse(&path, true).await?;
    assert_eq!(all.len(), 3);
    Ok(())
}

#[tokio::test]
async fn create_then_delete_restores_prior_state() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let target = tmp.path().join("fresh.txt");
    let path = target.to_string_lossy().into_owned();

    create_file(&path).await?;
    assert!(target.exists());
    // Creating over an existing path is refused.
    assert!(create_file(&path).await.is_err());

    delete(&path).await?;
    assert!(!target.exists());
    Ok(())
}

#[tokio::test]
async fn rename_moves_the_file() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let from = tmp.path().join("a.txt");
    let to = tmp.path().join("b.txt");
    std::fs::write(&from, "body")?;

    rename(&from.to_string_lossy(), &to.to_string_lossy()).await?;
    assert!(!from.exists());
    assert_eq!(std::fs::read_to_string(&to)?, "body");
    Ok(())
}

#[tokio::test]
async fn mkdir_creates_nested_directories() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let nested = tmp.path().join("a/b/c");
    mkdir(&nested.to_string_lossy()).await?;
    assert!(nested.is_dir());
    Ok(())
}

#[tokio::test]
async fn delete_removes_directory_trees() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("tree");
    std::fs::create_dir_all(dir.join("inner"))?;
    std::fs::write(dir.join("inner/file"), "x")?;
    delete(&dir.to_string_lossy()).await?;
    assert!(!dir.exists());
    Ok(())
}
