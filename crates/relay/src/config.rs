// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Cloud relay for fortynine agents and browsers.
#[derive(Debug, Clone, Parser)]
#[command(name = "fortynine-relay", version, about)]
pub struct RelayConfig {
    /// Host address to bind to.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "RELAY_PORT", default_value = "4490")]
    pub port: u16,

    /// Directory for persisted relay state.
    #[arg(long, env = "RELAY_DATA_DIR", default_value = "./relay-data")]
    pub data_dir: PathBuf,

    /// Public base URL, used in pairing links and upgrade URLs.
    #[arg(long, env = "RELAY_PUBLIC_URL")]
    pub public_url: Option<String>,
}

impl RelayConfig {
    /// The externally visible base URL.
    pub fn public_base(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
            .trim_end_matches('/')
            .to_owned()
    }

    /// Billing upgrade page handed out on quota violations.
    pub fn upgrade_url(&self) -> String {
        format!("{}/upgrade", self.public_base())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
