// =============================================================================
// Error taxonomy for the normalisation / indicator / money-flow pipeline
// =============================================================================
//
// Normalisation and aggregation errors are never recovered locally. They are
// returned to the dashboard facade, which either reports them per ticker
// (partial failures) or wraps them with the request context and aborts.
// Indicator maths has no error type: degenerate input gives degenerate output.
// =============================================================================

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::PriceField;

/// Failures while reconciling a raw provider table into canonical form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    /// The provider returned zero rows (bad tickers or bad date range).
    #[error("provider returned no rows")]
    EmptyResult,

    /// The requested field is not present in any recognised shape.
    #[error("field '{field}' not found; columns present: {present:?}")]
    SchemaMismatch {
        field: PriceField,
        present: Vec<String>,
    },

    /// Nested table has the field but no column for this ticker.
    #[error("no '{field}' column for ticker {ticker}; tickers present: {present:?}")]
    MissingTicker {
        field: PriceField,
        ticker: String,
        present: Vec<String>,
    },

    /// A flat (single-ticker) table cannot be attributed to several tickers.
    #[error("flat price table cannot serve {requested} tickers")]
    AmbiguousShape { requested: usize },

    #[error("duplicate trading date {0}")]
    DuplicateDate(NaiveDate),

    #[error("column '{column}' has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Failure of one ticker's contribution to the money-flow table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("ticker {ticker} is missing the '{field}' column")]
    MissingField { ticker: String, field: PriceField },

    #[error("ticker {ticker}: '{field}' has {actual} values for {expected} dates")]
    RaggedColumn {
        ticker: String,
        field: PriceField,
        expected: usize,
        actual: usize,
    },
}

/// The same (date, ticker) pair appeared twice while pivoting.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("duplicate money-flow entry for {ticker} on {date}")]
pub struct PivotConflict {
    pub date: NaiveDate,
    pub ticker: String,
}

/// Failures talking to the external market-data provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether a single immediate retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

/// What went wrong inside a dashboard request.
#[derive(Error, Debug)]
pub enum OrchestrationErrorKind {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Pivot(#[from] PivotConflict),
}

/// A terminal dashboard failure together with the request that caused it.
#[derive(Error, Debug)]
#[error("dashboard request for {tickers:?} ({start}..{end}) failed: {kind}")]
pub struct OrchestrationError {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[source]
    pub kind: OrchestrationErrorKind,
}
