// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Pedalea y Conquista API Server

use pedalea_conquista::{config::Config, db, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const RATE_LIMIT_SWEEP_PERIOD: Duration = Duration::from_secs(60);
const SESSION_PURGE_PERIOD: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        env = %config.app_env,
        backend = ?config.storage_backend,
        "Starting Pedalea y Conquista API"
    );

    let store = db::connect(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), store)?);

    // Background maintenance
    state.rate_limiter.clone().spawn_sweeper(RATE_LIMIT_SWEEP_PERIOD);
    state.sessions.clone().spawn_purger(SESSION_PURGE_PERIOD);

    // Build router
    let app = pedalea_conquista::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("pedalea_conquista=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
