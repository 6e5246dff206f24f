// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ton_transfer_server::{
    api::router,
    blockchain::{Client4, TonClient},
    config::{ServiceConfig, LOG_FORMAT_ENV},
    state::AppState,
    sync::AccountSync,
};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

/// Resolves on Ctrl-C or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for shutdown signal");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServiceConfig::from_env()?;
    let client: Arc<dyn TonClient> =
        Arc::new(Client4::new(&config.api_endpoint, config.rpc_timeout)?);

    let state = AppState::new(client.clone(), &config);
    let shutdown = CancellationToken::new();

    let sync = AccountSync::new(
        client,
        state.pending.clone(),
        state.fee_config.clone(),
        config.sync_wallet,
    )
    .with_poll_interval(config.sync_interval)
    .with_retry(config.retry.clone());
    let sync_handle = tokio::spawn(sync.run(shutdown.clone()));
    let eviction_handle = tokio::spawn(
        state
            .sessions
            .clone()
            .run_eviction(config.sync_interval, shutdown.clone()),
    );

    let pending = state.pending.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        network = config.network.config().name,
        endpoint = %config.api_endpoint,
        "TON transfer server listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    pending.shutdown();
    if let Err(e) = sync_handle.await {
        warn!(error = %e, "Account sync task ended abnormally");
    }
    if let Err(e) = eviction_handle.await {
        warn!(error = %e, "Session eviction task ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}
