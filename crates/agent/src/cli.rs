// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent CLI: start/status/stop lifecycle, relay configuration, and the
//! pairing-based login flow.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::config::{hostname, StartArgs, DEFAULT_CLOUD_URL};
use crate::state_dir::StateDir;

#[derive(Debug, Parser)]
#[command(name = "fortynine", version, about = "Host agent for the fortynine fabric.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the agent (foreground unless --daemon).
    Start(StartArgs),
    /// Report whether a local agent is running.
    Status(StateArgs),
    /// Stop a running local agent.
    Stop(StateArgs),
    /// Persist the relay URL.
    Config {
        /// Relay base URL (e.g. https://cloud.49agents.dev).
        url: String,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Store an agent token, pairing with the relay when none is given.
    Login {
        /// Agent token; omit to pair interactively.
        token: Option<String>,
        /// Relay base URL override.
        #[arg(long, env = "CLOUD_URL")]
        cloud_url: Option<String>,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Print service-installation instructions.
    InstallService,
}

#[derive(Debug, Clone, Parser)]
pub struct StateArgs {
    /// State directory (default: ~/.49agents).
    #[arg(long, env = "FORTYNINE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl StateArgs {
    fn open(&self) -> anyhow::Result<StateDir> {
        match &self.state_dir {
            Some(dir) => Ok(StateDir::new(dir.clone())),
            None => StateDir::from_home(),
        }
    }
}

/// Run a CLI command to completion; the return value is the process exit
/// code.
pub async fn run(cli: Cli) -> i32 {
    let result = match cli.command {
        Command::Start(args) => {
            crate::config::init_tracing(&args.log_format, &args.log_level);
            crate::run::run(args).await
        }
        Command::Status(state) => status(&state),
        Command::Stop(state) => stop(&state),
        Command::Config { url, state } => config(&url, &state),
        Command::Login { token, cloud_url, state } => login(token, cloud_url, &state).await,
        Command::InstallService => install_service(),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    }
}

fn status(state: &StateArgs) -> anyhow::Result<i32> {
    let state = state.open()?;
    match state.read_pid()? {
        Some(pid) if process_alive(pid) => {
            println!("agent running (pid {pid})");
            Ok(0)
        }
        Some(pid) => {
            println!("agent not running (stale pid file: {pid})");
            Ok(1)
        }
        None => {
            println!("agent not running");
            Ok(1)
        }
    }
}

fn stop(state: &StateArgs) -> anyhow::Result<i32> {
    let state = state.open()?;
    match state.read_pid()? {
        Some(pid) if process_alive(pid) => {
            terminate(pid)?;
            println!("sent SIGTERM to agent (pid {pid})");
            Ok(0)
        }
        _ => {
            println!("agent not running");
            Ok(1)
        }
    }
}

fn config(url: &str, state: &StateArgs) -> anyhow::Result<i32> {
    let state = state.open()?;
    state.write_cloud_url(url)?;
    println!("relay URL set to {url}");
    Ok(0)
}

#[derive(Debug, Deserialize)]
struct PairStart {
    code: String,
    #[serde(rename = "pairUrl")]
    pair_url: String,
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct PairStatus {
    status: String,
    token: Option<String>,
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

async fn login(
    token: Option<String>,
    cloud_url: Option<String>,
    state: &StateArgs,
) -> anyhow::Result<i32> {
    let state = state.open()?;

    if let Some(token) = token {
        state.write_credentials(&token, None)?;
        println!("token stored");
        return Ok(0);
    }

    let _ = rustls::crypto::ring::default_provider().install_default();
    let base = cloud_url
        .or_else(|| state.read_cloud_url().ok().flatten())
        .unwrap_or_else(|| DEFAULT_CLOUD_URL.to_owned());
    let base = base.trim_end_matches('/').to_owned();
    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

    let start: PairStart = client
        .post(format!("{base}/api/agents/pair"))
        .json(&serde_json::json!({
            "hostname": hostname(),
            "os": std::env::consts::OS,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("pairing code: {}", start.code);
    println!("approve at:   {}", start.pair_url);
    println!("code expires in {} seconds", start.expires_in);

    loop {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let resp = client
            .get(format!("{base}/api/agents/pair-status"))
            .query(&[("code", start.code.as_str())])
            .send()
            .await?;
        if resp.status().as_u16() == 410 {
            anyhow::bail!("pairing code expired; run login again");
        }
        if resp.status().as_u16() == 404 {
            anyhow::bail!("pairing code no longer known to the relay");
        }
        let status: PairStatus = resp.error_for_status()?.json().await?;
        if status.status == "approved" {
            let token = status
                .token
                .ok_or_else(|| anyhow::anyhow!("relay approved without a token"))?;
            state.write_credentials(&token, status.agent_id.as_deref())?;
            println!("paired; token stored");
            return Ok(0);
        }
    }
}

fn install_service() -> anyhow::Result<i32> {
    println!("# systemd unit for the fortynine agent");
    println!("# save as ~/.config/systemd/user/fortynine.service, then:");
    println!("#   systemctl --user enable --now fortynine");
    println!();
    println!("[Unit]");
    println!("Description=fortynine host agent");
    println!("After=network-online.target");
    println!();
    println!("[Service]");
    println!("ExecStart={} start", std::env::current_exe()?.display());
    println!("Restart=on-failure");
    println!("RestartSec=5");
    println!();
    println!("[Install]");
    println!("WantedBy=default.target");
    Ok(0)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn terminate(pid: u32) -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)?;
    Ok(())
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> anyhow::Result<()> {
    anyhow::bail!("stop is only supported on unix")
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
