// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local filesystem service: browse, read, and mutate files on the host.
//! Paths starting with `~` expand to the user's home.

use std::path::PathBuf;

use serde::Serialize;

use crate::state_dir::home_dir;

/// One directory listing entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirEntryInfo {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(input: &str) -> anyhow::Result<PathBuf> {
    if input.is_empty() {
        anyhow::bail!("path is required");
    }
    if input == "~" {
        return home_dir();
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(input))
}

/// List a directory. Dotfiles are omitted unless `show_hidden`; directories
/// sort before files, then alphabetically (case-insensitive).
pub async fn browse(path: &str, show_hidden: bool) -> anyhow::Result<Vec<DirEntryInfo>> {
    let dir = expand_path(path)?;
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !show_hidden && name.starts_with('.') {
            continue;
        }
        let meta = entry.metadata().await?;
        let is_directory = meta.is_dir();
        entries.push(DirEntryInfo {
            path: entry.path().to_string_lossy().into_owned(),
            size: if is_directory { None } else { Some(meta.len()) },
            name,
            is_directory,
        });
    }
    sort_entries(&mut entries);
    Ok(entries)
}

/// Directories first, then case-insensitive alphabetical.
pub fn sort_entries(entries: &mut [DirEntryInfo]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

pub async fn read_file(path: &str) -> anyhow::Result<String> {
    let file = expand_path(path)?;
    let bytes = tokio::fs::read(&file).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub async fn write_file(path: &str, content: &str) -> anyhow::Result<()> {
    let file = expand_path(path)?;
    tokio::fs::write(&file, content).await?;
    Ok(())
}

/// Create an empty file; fails if the path already exists.
pub async fn create_file(path: &str) -> anyhow::Result<()> {
    let file = expand_path(path)?;
    if tokio::fs::try_exists(&file).await? {
        anyhow::bail!("path already exists");
    }
    tokio::fs::write(&file, b"").await?;
    Ok(())
}

pub async fn rename(path: &str, new_path: &str) -> anyhow::Result<()> {
    let from = expand_path(path)?;
    let to = expand_path(new_path)?;
    tokio::fs::rename(&from, &to).await?;
    Ok(())
}

pub async fn mkdir(path: &str) -> anyhow::Result<()> {
    let dir = expand_path(path)?;
    tokio::fs::create_dir_all(&dir).await?;
    Ok(())
}

/// Remove a file or a directory tree.
pub async fn delete(path: &str) -> anyhow::Result<()> {
    let target = expand_path(path)?;
    let meta = tokio::fs::metadata(&target).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(&target).await?;
    } else {
        tokio::fs::remove_file(&target).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
