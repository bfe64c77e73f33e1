// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-host state directory (`~/.49agents`): the agent token, pid file,
//! relay URL, and one versioned JSON document per resource type.
//!
//! Documents are small and written rarely; every write is a full replace
//! through a temp file + rename so readers see either the old or the new
//! content.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Name of the state directory under the user's home.
pub const STATE_DIR_NAME: &str = ".49agents";

#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

/// Contents of `agent.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentials {
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl StateDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// State directory under the user's home profile.
    pub fn from_home() -> anyhow::Result<Self> {
        let home = home_dir()?;
        Ok(Self::new(home.join(STATE_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if missing.
    pub fn ensure(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Load a JSON document, returning `T::default()` when the file does
    /// not exist yet.
    pub fn load_doc<T: DeserializeOwned + Default>(&self, name: &str) -> anyhow::Result<T> {
        let path = self.path(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Full-replace write through a temp file + rename.
    pub fn save_doc<T: Serialize>(&self, name: &str, doc: &T) -> anyhow::Result<()> {
        self.ensure()?;
        let path = self.path(name);
        let tmp = self.path(&format!(".{name}.tmp"));
        let text = serde_json::to_string_pretty(doc)?;
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    // -- Credentials -------------------------------------------------------

    pub fn read_token(&self) -> anyhow::Result<Option<String>> {
        let creds: AgentCredentials = self.load_doc("agent.json")?;
        Ok(creds.token)
    }

    pub fn write_credentials(&self, token: &str, agent_id: Option<&str>) -> anyhow::Result<()> {
        self.save_doc(
            "agent.json",
            &AgentCredentials {
                token: Some(token.to_owned()),
                agent_id: agent_id.map(str::to_owned),
            },
        )
    }

    // -- Relay URL ---------------------------------------------------------

    pub fn read_cloud_url(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(self.path("cloud-url")) {
            Ok(text) => {
                let url = text.trim().to_owned();
                Ok(if url.is_empty() { None } else { Some(url) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_cloud_url(&self, url: &str) -> anyhow::Result<()> {
        self.ensure()?;
        std::fs::write(self.path("cloud-url"), format!("{}\n", url.trim()))?;
        Ok(())
    }

    // -- Pid file ----------------------------------------------------------

    pub fn read_pid(&self) -> anyhow::Result<Option<u32>> {
        match std::fs::read_to_string(self.path("agent.pid")) {
            Ok(text) => Ok(text.trim().parse().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_pid(&self, pid: u32) -> anyhow::Result<()> {
        self.ensure()?;
        std::fs::write(self.path("agent.pid"), format!("{pid}\n"))?;
        Ok(())
    }

    pub fn remove_pid(&self) {
        let _ = std::fs::remove_file(self.path("agent.pid"));
    }
}

/// The user's home directory, from the profile environment.
pub fn home_dir() -> anyhow::Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

#[cfg(test)]
#[path = "state_dir_tests.rs"]
mod tests;
