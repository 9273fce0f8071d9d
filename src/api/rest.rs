// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only. The rendering layer
// calls `/dashboard` once per render; every other route is for setup
// (`/config`) or operations (`/health`, `/errors`).
//
// CORS is configured permissively for development.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::dashboard::{build_dashboard_data, DashboardData, DashboardRequest, TickerSelection};
use crate::error::OrchestrationErrorKind;
use crate::indicators::IndicatorParams;

type ApiError = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(config))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/errors", get(errors))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    requests_served: u64,
    requests_failed: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        requests_served: state.requests_served.load(Ordering::Relaxed),
        requests_failed: state.requests_failed.load(Ordering::Relaxed),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Config
// =============================================================================

#[derive(Serialize)]
struct ConfigResponse {
    available_tickers: Vec<String>,
    default_tickers: Vec<String>,
    sectors: BTreeMap<String, Vec<String>>,
    default_start: NaiveDate,
    default_end: NaiveDate,
    indicators: IndicatorParams,
    money_flow_period: String,
}

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read();
    Json(ConfigResponse {
        available_tickers: config.available_tickers.clone(),
        default_tickers: config.default_tickers.clone(),
        sectors: config.sectors.clone(),
        default_start: config.default_start,
        default_end: config.default_end,
        indicators: config.indicators,
        money_flow_period: config.money_flow_period.clone(),
    })
}

// =============================================================================
// Dashboard
// =============================================================================

/// Comma-separated lists; absent parameters fall back to the configured
/// defaults.
#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    tickers: Option<String>,
    sectors: Option<String>,
    start: Option<String>,
    end: Option<String>,
    indicators: Option<String>,
}

fn split_list(raw: &str, uppercase: bool) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if uppercase { s.to_uppercase() } else { s.to_string() })
        .collect()
}

fn parse_date(name: &str, raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate, String> {
    match raw {
        None => Ok(default),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| format!("invalid {name} date '{s}': {e}")),
    }
}

fn status_for(kind: &OrchestrationErrorKind) -> (StatusCode, &'static str) {
    match kind {
        OrchestrationErrorKind::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        OrchestrationErrorKind::Normalization(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "normalization")
        }
        OrchestrationErrorKind::Provider(_) => (StatusCode::BAD_GATEWAY, "provider"),
        OrchestrationErrorKind::Pivot(_) => (StatusCode::INTERNAL_SERVER_ERROR, "pivot"),
    }
}

fn reject(state: &AppState, status: StatusCode, code: &str, message: String) -> ApiError {
    state.push_error_with_code(message.clone(), Some(code.to_string()));
    (status, Json(json!({ "error": message })))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardData>, ApiError> {
    let config = state.config_snapshot();

    let start = parse_date("start", query.start.as_deref(), config.default_start)
        .map_err(|msg| reject(&state, StatusCode::BAD_REQUEST, "invalid_request", msg))?;
    let end = parse_date("end", query.end.as_deref(), config.default_end)
        .map_err(|msg| reject(&state, StatusCode::BAD_REQUEST, "invalid_request", msg))?;

    let sectors = query
        .sectors
        .as_deref()
        .map(|s| split_list(s, false))
        .unwrap_or_default();
    let user = match query.tickers.as_deref() {
        Some(raw) => split_list(raw, true),
        None if sectors.is_empty() => config.default_tickers.iter().cloned().collect(),
        None => BTreeSet::new(),
    };

    let request = DashboardRequest {
        selection: TickerSelection { user, sectors },
        start,
        end,
        indicator_tickers: query.indicators.as_deref().map(|s| split_list(s, true)),
    };

    match build_dashboard_data(state.provider.as_ref(), &config, &request).await {
        Ok(data) => {
            state.record_success();
            info!(
                request_id = %data.request_id,
                tickers = ?data.tickers,
                warnings = data.warnings.len(),
                "dashboard served"
            );
            Ok(Json(data))
        }
        Err(e) => {
            let (status, code) = status_for(&e.kind);
            warn!(status = %status, error = %e, "dashboard request rejected");
            Err(reject(&state, status, code, e.to_string()))
        }
    }
}

// =============================================================================
// Error log
// =============================================================================

async fn errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let errors = state.recent_errors.read().clone();
    Json(errors)
}
