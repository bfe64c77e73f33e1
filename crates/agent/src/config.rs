// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use crate::state_dir::StateDir;

/// Default relay base URL when neither `--cloud-url`, `CLOUD_URL`, nor the
/// persisted `cloud-url` file provides one.
pub const DEFAULT_CLOUD_URL: &str = "https://cloud.49agents.dev";

/// Arguments for `fortynine start`.
#[derive(Debug, Clone, Parser)]
pub struct StartArgs {
    /// Detach and keep running in the background.
    #[arg(long)]
    pub daemon: bool,

    /// Relay base URL.
    #[arg(long, env = "CLOUD_URL")]
    pub cloud_url: Option<String>,

    /// State directory (default: ~/.49agents).
    #[arg(long, env = "FORTYNINE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Web-tty bridge binary driven per terminal session.
    #[arg(long, env = "FORTYNINE_BRIDGE_CMD", default_value = "ttyd")]
    pub bridge_cmd: String,

    /// Log format (json or text).
    #[arg(long, env = "FORTYNINE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "FORTYNINE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Fully resolved agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub cloud_url: String,
    pub token: String,
    pub hostname: String,
    pub os: String,
    pub version: String,
    pub bridge_cmd: String,
}

impl AgentConfig {
    /// Resolve the effective configuration from CLI args and the state
    /// directory. Fails when no agent token has been stored yet.
    pub fn resolve(args: &StartArgs, state: &StateDir) -> anyhow::Result<Self> {
        let cloud_url = args
            .cloud_url
            .clone()
            .or_else(|| state.read_cloud_url().ok().flatten())
            .unwrap_or_else(|| DEFAULT_CLOUD_URL.to_owned());

        let token = state
            .read_token()?
            .ok_or_else(|| anyhow::anyhow!("no agent token; run `fortynine login` first"))?;

        Ok(Self {
            cloud_url: cloud_url.trim_end_matches('/').to_owned(),
            token,
            hostname: hostname(),
            os: std::env::consts::OS.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            bridge_cmd: args.bridge_cmd.clone(),
        })
    }

    /// WebSocket URL of the relay's agent endpoint.
    pub fn agent_ws_url(&self) -> String {
        let base = if self.cloud_url.starts_with("https://") {
            self.cloud_url.replacen("https://", "wss://", 1)
        } else {
            self.cloud_url.replacen("http://", "ws://", 1)
        };
        format!("{base}/agent-ws")
    }
}

/// Best-effort hostname; falls back to "unknown".
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_owned())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Install a tracing subscriber per the log flags.
pub fn init_tracing(log_format: &str, log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_owned()));
    if log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
