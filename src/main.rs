// =============================================================================
// Stock Dashboard — Main Entry Point
// =============================================================================
//
// Serves the dashboard data products (normalised prices, RSI/MACD, money-flow
// heatmap) over a small read-only REST API. Every request is computed from
// fresh provider data; nothing is cached between requests.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod dashboard;
mod error;
mod indicators;
mod market_data;
mod money_flow;
mod provider;
mod runtime_config;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::provider::YahooClient;
use crate::runtime_config::DashboardConfig;

const DEFAULT_CONFIG_PATH: &str = "dashboard_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Stock Dashboard starting up");

    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = DashboardConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = DashboardConfig::default();
        if !Path::new(&config_path).exists() {
            if let Err(e) = defaults.save(&config_path) {
                warn!(error = %e, "Failed to write default config");
            }
        }
        defaults
    });

    config.apply_env_overrides();
    config.validate().context("invalid dashboard configuration")?;

    info!(
        tickers = ?config.default_tickers,
        sectors = ?config.sectors.keys().collect::<Vec<_>>(),
        start = %config.default_start,
        end = %config.default_end,
        "Configured dashboard defaults"
    );

    // ── 2. Provider & shared state ───────────────────────────────────────
    let provider = YahooClient::new(config.provider_base_url.clone(), config.provider_timeout())
        .context("failed to build market-data client")?;
    info!(base_url = %config.provider_base_url, "Market-data provider ready");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(provider)));

    // ── 3. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!(
        served = state
            .requests_served
            .load(std::sync::atomic::Ordering::Relaxed),
        "Stock Dashboard shut down complete."
    );
    Ok(())
}
