// ABOUTME: Server binary: wires config, storage, OAuth, sync, and HTTP routes
// ABOUTME: Environment-driven configuration with a CLI port override
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

use anyhow::Result;
use clap::Parser;
use rinkside::config::ServerConfig;
use rinkside::database::Database;
use rinkside::logging;
use rinkside::oauth::{AuthManager, YahooIdentityProvider};
use rinkside::providers::YahooFantasyClient;
use rinkside::routes::{router, AppState};
use rinkside::sync::SyncService;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rinkside-server")]
#[command(about = "Fantasy hockey dashboard backend")]
#[command(version)]
struct Args {
    /// HTTP port (overrides HTTP_PORT)
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    info!("Starting rinkside-server: {}", config.summary());
    config.oauth.log_diagnostics();

    let database = Arc::new(
        Database::new(&config.database_url, config.encryption_key.clone()).await?,
    );
    info!("Database ready at {}", config.database_url);

    let provider = Arc::new(YahooIdentityProvider::new(config.oauth.clone()));
    let auth = Arc::new(AuthManager::with_refresh_skew(
        database.clone(),
        provider,
        config.token_refresh_skew_minutes,
    ));

    let api = Arc::new(YahooFantasyClient::new(config.oauth.api_base_url.clone()));
    let sync = Arc::new(SyncService::new(
        database.clone(),
        auth.clone(),
        api.clone(),
        config.fetch.clone(),
    ));

    let state = AppState {
        database,
        auth,
        sync,
        api,
    };
    let app = router(state, &config.cors_origins);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {e}");
        return;
    }
    info!("Shutdown signal received, draining connections");
}
