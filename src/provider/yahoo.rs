// =============================================================================
// Yahoo Finance chart client — public daily OHLCV endpoint
// =============================================================================
//
// One GET per ticker against /v8/finance/chart/{ticker}. Each response is
// parsed into a `TickerFrame`; the frames are then outer-joined on date by
// `assemble_table`.
//
// Every request carries the configured timeout. A transient failure
// (timeout, connect error, 429, 5xx) is retried exactly once after a short
// pause; anything else is returned to the caller.
// =============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{assemble_table, MarketDataProvider};
use crate::error::ProviderError;
use crate::market_data::{PriceTable, TickerFrame};
use crate::types::PriceField;

/// Pause before the single retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-dashboard/1.0";

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Yahoo Finance chart API client.
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client against `base_url` (e.g. `https://query1.finance.yahoo.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        debug!(base_url = %base_url, ?timeout, "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    /// GET the chart for one ticker, retrying once on transient failure.
    #[instrument(skip(self, query), name = "yahoo::get_chart")]
    async fn get_chart(
        &self,
        ticker: &str,
        query: &[(&str, String)],
    ) -> Result<TickerFrame, ProviderError> {
        match self.get_chart_once(ticker, query).await {
            Err(e) if e.is_transient() => {
                warn!(ticker, error = %e, "transient provider failure — retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.get_chart_once(ticker, query).await
            }
            other => other,
        }
    }

    async fn get_chart_once(
        &self,
        ticker: &str,
        query: &[(&str, String)],
    ) -> Result<TickerFrame, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);

        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        // "No data" comes back as 404 with a structured error body; treat it
        // as zero rows rather than a failure. Any other non-success status is
        // reported as such, even when the body is a chart error, so that 429
        // and 5xx stay retryable.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<ChartEnvelope>(&body) {
            Ok(envelope) => parse_chart(ticker, envelope),
            Err(_) if !status.is_success() => Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(ProviderError::Parse(format!("{ticker}: {e}"))),
        }
    }

    async fn fetch_all(
        &self,
        tickers: &[String],
        query: &[(&str, String)],
    ) -> Result<PriceTable, ProviderError> {
        let mut frames = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            frames.push(self.get_chart(ticker, query).await?);
        }
        let table = assemble_table(&frames)?;
        debug!(tickers = tickers.len(), rows = table.len(), "provider table assembled");
        Ok(table)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_range")]
    async fn fetch_range(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, ProviderError> {
        let query = [
            ("period1", midnight_utc(start).to_string()),
            ("period2", midnight_utc(end).to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        self.fetch_all(tickers, &query).await
    }

    #[instrument(skip(self), name = "yahoo::fetch_period")]
    async fn fetch_period(
        &self,
        tickers: &[String],
        period: &str,
        interval: &str,
    ) -> Result<PriceTable, ProviderError> {
        let query = [
            ("range", period.to_string()),
            ("interval", interval.to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        self.fetch_all(tickers, &query).await
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing helpers
// -----------------------------------------------------------------------------

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// A frame with every quote column present but no rows.
fn empty_frame(ticker: &str) -> TickerFrame {
    let fields = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];
    TickerFrame {
        ticker: ticker.to_string(),
        dates: Vec::new(),
        columns: fields.into_iter().map(|f| (f, Vec::new())).collect(),
    }
}

fn parse_chart(ticker: &str, envelope: ChartEnvelope) -> Result<TickerFrame, ProviderError> {
    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            warn!(ticker, description = %err.description, "no data for ticker");
            return Ok(empty_frame(ticker));
        }
        return Err(ProviderError::Parse(format!(
            "{ticker}: {} ({})",
            err.code, err.description
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(empty_frame(ticker));
    };

    let n = result.timestamp.len();
    let mut dates = Vec::with_capacity(n);
    for &ts in &result.timestamp {
        let local = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .ok_or_else(|| ProviderError::Parse(format!("{ticker}: bad timestamp {ts}")))?;
        dates.push(local.date_naive());
    }

    let mut raw: Vec<(PriceField, Vec<Option<f64>>)> = Vec::new();
    if let Some(q) = result.indicators.quote.into_iter().next() {
        raw.push((PriceField::Open, q.open));
        raw.push((PriceField::High, q.high));
        raw.push((PriceField::Low, q.low));
        raw.push((PriceField::Close, q.close));
        raw.push((PriceField::Volume, q.volume));
    }
    if let Some(a) = result.indicators.adjclose.into_iter().next() {
        raw.push((PriceField::AdjClose, a.adjclose));
    }

    let mut columns = BTreeMap::new();
    for (field, values) in raw {
        // Absent arrays mean the provider does not offer this field.
        if values.is_empty() && n > 0 {
            continue;
        }
        if values.len() != n {
            return Err(ProviderError::Parse(format!(
                "{ticker}: '{field}' has {} values for {n} timestamps",
                values.len()
            )));
        }
        columns.insert(field, values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
    }

    Ok(dedupe_dates(TickerFrame {
        ticker: ticker.to_string(),
        dates,
        columns,
    }))
}

/// Keep the last bar for each date; a live bar for the current session can
/// repeat the date of the last completed daily bar.
fn dedupe_dates(frame: TickerFrame) -> TickerFrame {
    let mut keep: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for (i, date) in frame.dates.iter().enumerate() {
        keep.insert(*date, i);
    }
    if keep.len() == frame.dates.len() {
        return frame;
    }

    let rows: Vec<usize> = keep.values().copied().collect();
    TickerFrame {
        ticker: frame.ticker,
        dates: keep.into_keys().collect(),
        columns: frame
            .columns
            .into_iter()
            .map(|(f, v)| (f, rows.iter().map(|&i| v[i]).collect()))
            .collect(),
    }
}
