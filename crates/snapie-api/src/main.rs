//! # snapie-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for audio upload and playback.
//! Binds to `PORT` (default 3000).

use std::net::SocketAddr;
use std::sync::Arc;

use snapie_api::config::AppConfig;
use snapie_api::state::AppState;
use snapie_ipfs::{HttpGatewayFetcher, IpfsPinClient, PinConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    init_tracing(config.as_ref().is_ok_and(|c| c.log_json));

    let config = config.map_err(|e| {
        tracing::error!("Configuration invalid: {e}");
        e
    })?;
    tracing::info!(
        primary = %config.gateways.primary_gateway,
        local = config.gateways.local_gateway.is_some(),
        fallbacks = config.gateways.fallback_gateways.len(),
        "gateways configured"
    );

    // Database pool is optional; absent means in-memory stores.
    let db_pool = snapie_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let pin_config = PinConfig::from_env()?;
    tracing::info!(api = %pin_config.api_url, "IPFS pin client configured");
    let content = IpfsPinClient::new(&pin_config)?;

    let port = config.port;
    let state = AppState::new(
        config,
        Arc::new(content),
        Arc::new(HttpGatewayFetcher::default()),
        db_pool,
    );
    let app = snapie_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Snapie audio API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// `RUST_LOG` filter (default `info`); JSON lines when the config asks.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
