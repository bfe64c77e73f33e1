// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fortynine cloud relay: authenticates browsers and agents, routes
//! request/response and streaming traffic between them, enforces tier
//! quotas, and persists cross-device state.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod pairing;
pub mod registry;
pub mod router;
pub mod state;
pub mod store;
pub mod transport;
pub mod ws_agent;
pub mod ws_browser;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RelayConfig;
use crate::state::RelayState;

/// Run the relay until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = Arc::new(RelayState::new(config)?);
    state.pairing.spawn_sweeper(shutdown.clone());

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal_shutdown.cancel();
    });

    info!("fortynine-relay listening on {addr}");
    let router = transport::build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
