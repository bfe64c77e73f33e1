// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime: wires the transport, terminal manager, detector, metrics,
//! and service router together, and owns graceful shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fortynine_proto::messages::Message;
use fortynine_proto::Envelope;

use crate::claude::{ClaudeDetector, ClaudePaths};
use crate::config::{AgentConfig, StartArgs};
use crate::metrics::MetricsCollector;
use crate::router::{dispatch, RequestContext};
use crate::services::panes::PaneStores;
use crate::services::Services;
use crate::state_dir::StateDir;
use crate::terminal::bridge::BridgeSpawner;
use crate::terminal::tmux::Tmux;
use crate::terminal::TerminalManager;
use crate::transport::{self, LinkExit, Outbound};

/// Run the agent until shutdown. Returns the process exit code.
pub async fn run(args: StartArgs) -> anyhow::Result<i32> {
    let state = match &args.state_dir {
        Some(dir) => StateDir::new(dir.clone()),
        None => StateDir::from_home()?,
    };
    state.ensure()?;

    let config = AgentConfig::resolve(&args, &state)?;

    if args.daemon {
        return daemonize(&args);
    }

    let _ = rustls::crypto::ring::default_provider().install_default();

    state.write_pid(std::process::id())?;
    info!(cloud_url = %config.cloud_url, hostname = %config.hostname, "agent starting");

    let shutdown = CancellationToken::new();
    let (outbound, outbound_rx) = transport::outbound_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    // Terminal plumbing.
    let tmux = Tmux::new();
    let spawner = BridgeSpawner::new(config.bridge_cmd.clone());
    spawner.reclaim_ports().await;
    let terminals = Arc::new(TerminalManager::new(
        tmux.clone(),
        state.clone(),
        spawner,
        outbound.clone(),
        config.hostname.clone(),
    ));
    terminals.reconcile().await?;

    // Detector + metrics loops.
    let detector = ClaudeDetector::new(tmux.clone(), ClaudePaths::from_home()?);
    let claude_states = detector.snapshot_handle();
    tokio::spawn(detector.run(outbound.clone(), shutdown.clone()));

    let metrics = Arc::new(tokio::sync::Mutex::new(MetricsCollector::new()));
    tokio::spawn(MetricsCollector::run(
        Arc::clone(&metrics),
        outbound.clone(),
        shutdown.clone(),
    ));

    let services = Arc::new(Services {
        config: config.clone(),
        state: state.clone(),
        tmux,
        terminals: Arc::clone(&terminals),
        panes: PaneStores::open(&state)?,
        claude_states,
        metrics,
    });

    tokio::spawn(dispatch_inbound(
        Arc::clone(&services),
        inbound_rx,
        outbound.clone(),
        shutdown.clone(),
    ));

    // Drive the relay link; signals cancel everything.
    let mut link = tokio::spawn(transport::run(
        config,
        outbound,
        outbound_rx,
        inbound_tx,
        shutdown.clone(),
    ));

    let exit = tokio::select! {
        _ = wait_for_signal() => {
            info!("shutdown signal received");
            shutdown.cancel();
            (&mut link).await.unwrap_or(LinkExit::Shutdown)
        }
        result = &mut link => {
            shutdown.cancel();
            result.unwrap_or(LinkExit::Shutdown)
        }
    };

    terminals.shutdown().await;
    state.remove_pid();

    match exit {
        LinkExit::Shutdown => Ok(0),
        LinkExit::AuthFailed(reason) => {
            warn!(reason = %reason, "exiting after authentication failure");
            Ok(1)
        }
    }
}

/// Consume inbound frames, spawning one task per request or terminal
/// operation so a slow handler never stalls the stream.
async fn dispatch_inbound(
    services: Arc<Services>,
    mut inbound_rx: mpsc::UnboundedReceiver<Envelope>,
    outbound: Outbound,
    shutdown: CancellationToken,
) {
    loop {
        let env = tokio::select! {
            _ = shutdown.cancelled() => break,
            env = inbound_rx.recv() => match env {
                Some(env) => env,
                None => break,
            },
        };

        match env.message {
            Message::Request(req) => {
                let Some(id) = env.id else {
                    debug!(path = %req.path, "request without id; dropping");
                    continue;
                };
                let services = Arc::clone(&services);
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    let ctx = RequestContext { outbound: outbound.clone(), id: Some(id.clone()) };
                    let response = dispatch(&services, &req, &ctx).await;
                    if !outbound.send_with_id(Message::Response(response), &id) {
                        debug!(id = %id, "response dropped; transport closed");
                    }
                });
            }
            Message::TerminalAttach(attach) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.attach(&attach.terminal_id, attach.cols, attach.rows).await;
                });
            }
            Message::TerminalInput(input) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.input(&input.terminal_id, &input.data).await;
                });
            }
            Message::TerminalResize(resize) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.resize(&resize.terminal_id, resize.cols, resize.rows).await;
                });
            }
            Message::TerminalScroll(scroll) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.scroll(&scroll.terminal_id, scroll.lines).await;
                });
            }
            Message::TerminalDetach(detach) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.detach(&detach.terminal_id).await;
                });
            }
            Message::TerminalClose(close) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    terminals.close(&close.terminal_id).await;
                });
            }
            Message::TerminalResume(resume) => {
                let terminals = Arc::clone(&services.terminals);
                tokio::spawn(async move {
                    let _ = terminals
                        .resume(&resume.terminal_id, resume.working_dir.as_deref())
                        .await;
                });
            }
            other => {
                debug!(kind = other.kind(), "unexpected inbound message");
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Re-exec as a detached background process and return immediately.
fn daemonize(args: &StartArgs) -> anyhow::Result<i32> {
    let exe = std::env::current_exe()?;
    let mut cmd = std::process::Command::new(exe);
    cmd.arg("start");
    if let Some(url) = &args.cloud_url {
        cmd.args(["--cloud-url", url]);
    }
    if let Some(dir) = &args.state_dir {
        cmd.arg("--state-dir").arg(dir);
    }
    cmd.args(["--bridge-cmd", &args.bridge_cmd]);
    cmd.args(["--log-format", &args.log_format]);
    cmd.args(["--log-level", &args.log_level]);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let child = cmd.spawn()?;
    println!("agent started in background (pid {})", child.id());
    Ok(0)
}
