// =============================================================================
// Dashboard Facade — fetch, normalise, compute, pivot
// =============================================================================
//
// One call per dashboard render:
//
//   1. resolve the ticker selection (user tickers ∪ sector tickers)
//   2. fetch daily bars for the date range and normalise them to "Close"
//      (falling back to the legacy "Adj Close" name)
//   3. compute RSI / MACD for the requested indicator tickers
//   4. fetch a short trailing OHLCV window, aggregate money flow, pivot
//
// Nothing outlives the call. Global failures (bad request, provider error,
// empty or unrecognised tables) abort the request; per-ticker failures become
// warnings next to the data of the remaining tickers.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationErrorKind};
use crate::indicators::TickerIndicators;
use crate::market_data::{normalize_preferred, ticker_frames, CanonicalSeries, CLOSE_PREFERENCE};
use crate::money_flow::{money_flow, pivot, MoneyFlowMatrix};
use crate::provider::MarketDataProvider;
use crate::runtime_config::DashboardConfig;

// =============================================================================
// Request types
// =============================================================================

/// Tickers picked directly plus whole sectors picked by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSelection {
    pub user: BTreeSet<String>,
    pub sectors: BTreeSet<String>,
}

impl TickerSelection {
    /// The union of the user tickers and every selected sector's members.
    ///
    /// Builds a new set; the selection itself is never modified, so repeated
    /// requests from the same session see the same input.
    pub fn resolve(
        &self,
        sector_map: &BTreeMap<String, Vec<String>>,
    ) -> Result<BTreeSet<String>, OrchestrationErrorKind> {
        let mut tickers = self.user.clone();
        for sector in &self.sectors {
            let members = sector_map.get(sector).ok_or_else(|| {
                OrchestrationErrorKind::InvalidRequest(format!("unknown sector '{sector}'"))
            })?;
            tickers.extend(members.iter().cloned());
        }
        Ok(tickers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRequest {
    pub selection: TickerSelection,
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    /// Tickers to compute indicators for; all resolved tickers when `None`.
    #[serde(default)]
    pub indicator_tickers: Option<BTreeSet<String>>,
}

// =============================================================================
// Response types
// =============================================================================

/// A per-ticker problem that did not stop the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerWarning {
    pub ticker: String,
    pub message: String,
}

/// Everything the rendering layer needs for one dashboard render.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub request_id: Uuid,
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Price trend chart.
    pub prices: CanonicalSeries,
    pub latest_prices: BTreeMap<String, f64>,
    pub indicators: BTreeMap<String, TickerIndicators>,
    /// Money-flow heatmap.
    pub money_flow: MoneyFlowMatrix,
    pub warnings: Vec<TickerWarning>,
}

// =============================================================================
// Facade
// =============================================================================

/// Build all dashboard data products for `request`.
#[instrument(skip_all, fields(start = %request.start, end = %request.end))]
pub async fn build_dashboard_data(
    provider: &dyn MarketDataProvider,
    config: &DashboardConfig,
    request: &DashboardRequest,
) -> Result<DashboardData, OrchestrationError> {
    let resolved = request.selection.resolve(&config.sectors);

    let context: Vec<String> = match &resolved {
        Ok(tickers) => tickers.iter().cloned().collect(),
        Err(_) => request.selection.user.iter().cloned().collect(),
    };

    let outcome = match resolved {
        Ok(tickers) => run(provider, config, request, tickers).await,
        Err(kind) => Err(kind),
    };

    outcome.map_err(|kind| {
        let err = OrchestrationError {
            tickers: context,
            start: request.start,
            end: request.end,
            kind,
        };
        warn!(error = %err, "dashboard request failed");
        err
    })
}

async fn run(
    provider: &dyn MarketDataProvider,
    config: &DashboardConfig,
    request: &DashboardRequest,
    tickers: BTreeSet<String>,
) -> Result<DashboardData, OrchestrationErrorKind> {
    if tickers.is_empty() {
        return Err(OrchestrationErrorKind::InvalidRequest(
            "select at least one ticker".into(),
        ));
    }
    if request.start >= request.end {
        return Err(OrchestrationErrorKind::InvalidRequest(format!(
            "start date {} must be before end date {}",
            request.start, request.end
        )));
    }

    let indicator_tickers = request
        .indicator_tickers
        .clone()
        .unwrap_or_else(|| tickers.clone());
    if let Some(stray) = indicator_tickers.difference(&tickers).next() {
        return Err(OrchestrationErrorKind::InvalidRequest(format!(
            "indicator ticker {stray} is not part of the selection"
        )));
    }

    let request_id = Uuid::new_v4();
    let list: Vec<String> = tickers.iter().cloned().collect();
    let mut warnings = Vec::new();

    // --- Price history -> canonical close series -----------------------------
    let raw = provider
        .fetch_range(&list, request.start, request.end)
        .await?;
    let prices = normalize_preferred(&raw, &tickers, &CLOSE_PREFERENCE)?;

    for ticker in &list {
        if prices.observations(ticker).is_empty() {
            warnings.push(TickerWarning {
                ticker: ticker.clone(),
                message: "no price data in the selected range".into(),
            });
        }
    }

    // --- Indicators ----------------------------------------------------------
    let indicators: BTreeMap<String, TickerIndicators> = indicator_tickers
        .iter()
        .map(|ticker| {
            let observations = prices.observations(ticker);
            (
                ticker.clone(),
                TickerIndicators::compute(&observations, &config.indicators),
            )
        })
        .collect();

    // --- Money flow over the trailing window ---------------------------------
    let recent = provider
        .fetch_period(&list, &config.money_flow_period, &config.money_flow_interval)
        .await?;
    let frames = ticker_frames(&recent, &tickers)?;
    let report = money_flow(&frames);
    warnings.extend(report.failures.iter().map(|(ticker, e)| TickerWarning {
        ticker: ticker.clone(),
        message: e.to_string(),
    }));

    let failed: BTreeSet<&str> = report.failures.iter().map(|(t, _)| t.as_str()).collect();
    let flowing: BTreeSet<&str> = report.rows.iter().map(|r| r.ticker.as_str()).collect();
    for ticker in &list {
        if !failed.contains(ticker.as_str()) && !flowing.contains(ticker.as_str()) {
            warnings.push(TickerWarning {
                ticker: ticker.clone(),
                message: format!(
                    "no trading data in the last {} for money flow",
                    config.money_flow_period
                ),
            });
        }
    }

    let matrix = pivot(&report.rows)?;

    info!(
        %request_id,
        tickers = list.len(),
        price_rows = prices.len(),
        field = %prices.field(),
        money_flow_rows = report.rows.len(),
        warnings = warnings.len(),
        "dashboard data built"
    );

    Ok(DashboardData {
        request_id,
        tickers: list,
        start: request.start,
        end: request.end,
        latest_prices: prices.latest_prices(),
        prices,
        indicators,
        money_flow: matrix,
        warnings,
    })
}
