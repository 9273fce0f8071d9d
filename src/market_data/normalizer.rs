// =============================================================================
// Schema Normaliser — one decision point for provider table shapes
// =============================================================================
//
// Provider responses differ by ticker count (flat vs. field/ticker keyed) and
// by provider version ("Adj Close" vs. "Close"). Everything downstream of this
// module works on `CanonicalSeries` or `TickerFrame` and never looks at the
// raw layout again.
//
// NaN values are carried through untouched; it is up to each consumer to
// decide what a hole in the date index means.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::NormalizationError;
use crate::market_data::price_table::{PriceTable, TableColumns, TickerFrame};
use crate::types::PriceField;

/// Field preference used by the dashboard: current name first, legacy second.
pub const CLOSE_PREFERENCE: [PriceField; 2] = [PriceField::Close, PriceField::AdjClose];

// =============================================================================
// CanonicalSeries
// =============================================================================

/// `{date -> {ticker -> price}}` for one price field.
///
/// Dates are strictly ascending and every row carries one value per ticker
/// (possibly NaN). Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSeries {
    field: PriceField,
    tickers: Vec<String>,
    rows: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl CanonicalSeries {
    pub fn field(&self) -> PriceField {
        self.field
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn rows(&self) -> &BTreeMap<NaiveDate, BTreeMap<String, f64>> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Date-ordered finite observations for one ticker.
    pub fn observations(&self, ticker: &str) -> Vec<(NaiveDate, f64)> {
        self.rows
            .iter()
            .filter_map(|(date, row)| {
                row.get(ticker)
                    .copied()
                    .filter(|v| v.is_finite())
                    .map(|v| (*date, v))
            })
            .collect()
    }

    /// Most recent finite price per ticker, rounded to cents (ties to even).
    pub fn latest_prices(&self) -> BTreeMap<String, f64> {
        self.tickers
            .iter()
            .filter_map(|ticker| {
                self.rows
                    .values()
                    .rev()
                    .find_map(|row| row.get(ticker).copied().filter(|v| v.is_finite()))
                    .map(|v| (ticker.clone(), (v * 100.0).round_ties_even() / 100.0))
            })
            .collect()
    }
}

// =============================================================================
// Normalisation
// =============================================================================

/// Project `table` onto `field`, producing exactly one column per ticker.
///
/// Recognised shapes:
/// - nested (field, ticker): `field` must exist at the outer level and every
///   requested ticker must exist under it;
/// - flat: only valid for a single requested ticker, `field` must be a column.
#[instrument(skip(table, tickers), fields(rows = table.len(), tickers = tickers.len()))]
pub fn normalize(
    table: &PriceTable,
    tickers: &BTreeSet<String>,
    field: PriceField,
) -> Result<CanonicalSeries, NormalizationError> {
    if table.is_empty() {
        return Err(NormalizationError::EmptyResult);
    }

    let mismatch = || NormalizationError::SchemaMismatch {
        field,
        present: table.field_names(),
    };

    let columns: BTreeMap<&str, &[f64]> = match table.columns() {
        TableColumns::Nested(cols) => {
            let by_ticker = cols.get(&field).ok_or_else(mismatch)?;
            tickers
                .iter()
                .map(|ticker| {
                    by_ticker
                        .get(ticker)
                        .map(|v| (ticker.as_str(), v.as_slice()))
                        .ok_or_else(|| NormalizationError::MissingTicker {
                            field,
                            ticker: ticker.clone(),
                            present: by_ticker.keys().cloned().collect(),
                        })
                })
                .collect::<Result<_, _>>()?
        }
        TableColumns::Flat(cols) => {
            let ticker = single_ticker(tickers)?;
            let values = cols.get(&field).ok_or_else(mismatch)?;
            BTreeMap::from([(ticker, values.as_slice())])
        }
    };

    let order = date_order(table.dates())?;
    let rows: BTreeMap<NaiveDate, BTreeMap<String, f64>> = order
        .into_iter()
        .map(|i| {
            let row: BTreeMap<String, f64> = columns
                .iter()
                .map(|(ticker, values)| (ticker.to_string(), values[i]))
                .collect();
            (table.dates()[i], row)
        })
        .collect();

    debug!(%field, "price table normalised");

    Ok(CanonicalSeries {
        field,
        tickers: tickers.iter().cloned().collect(),
        rows,
    })
}

/// Try each field in `preference` order, falling back only when the field is
/// absent. Any other error is returned straight away.
pub fn normalize_preferred(
    table: &PriceTable,
    tickers: &BTreeSet<String>,
    preference: &[PriceField],
) -> Result<CanonicalSeries, NormalizationError> {
    let mut last_mismatch = None;
    for &field in preference {
        match normalize(table, tickers, field) {
            Err(e @ NormalizationError::SchemaMismatch { .. }) => {
                debug!(%field, "field absent, trying next preference");
                last_mismatch = Some(e);
            }
            other => return other,
        }
    }
    Err(last_mismatch.unwrap_or(NormalizationError::SchemaMismatch {
        field: PriceField::Close,
        present: table.field_names(),
    }))
}

/// Split an OHLCV table into one date-ascending frame per requested ticker.
///
/// A ticker absent from a nested table gets a frame without columns; the
/// money-flow aggregator reports that as a per-ticker failure.
#[instrument(skip(table, tickers), fields(rows = table.len(), tickers = tickers.len()))]
pub fn ticker_frames(
    table: &PriceTable,
    tickers: &BTreeSet<String>,
) -> Result<BTreeMap<String, TickerFrame>, NormalizationError> {
    if table.is_empty() {
        return Err(NormalizationError::EmptyResult);
    }

    let order = date_order(table.dates())?;
    let dates: Vec<NaiveDate> = order.iter().map(|&i| table.dates()[i]).collect();
    let reorder = |values: &[f64]| order.iter().map(|&i| values[i]).collect::<Vec<f64>>();

    let frames = match table.columns() {
        TableColumns::Flat(cols) => {
            let ticker = single_ticker(tickers)?;
            let frame = TickerFrame {
                ticker: ticker.to_string(),
                dates,
                columns: cols.iter().map(|(f, v)| (*f, reorder(v.as_slice()))).collect(),
            };
            BTreeMap::from([(ticker.to_string(), frame)])
        }
        TableColumns::Nested(cols) => tickers
            .iter()
            .map(|ticker| {
                let columns = cols
                    .iter()
                    .filter_map(|(field, by_ticker)| {
                        by_ticker.get(ticker).map(|v| (*field, reorder(v.as_slice())))
                    })
                    .collect();
                let frame = TickerFrame {
                    ticker: ticker.clone(),
                    dates: dates.clone(),
                    columns,
                };
                (ticker.clone(), frame)
            })
            .collect(),
    };

    Ok(frames)
}

// =============================================================================
// Internal helpers
// =============================================================================

fn single_ticker(tickers: &BTreeSet<String>) -> Result<&str, NormalizationError> {
    match tickers.iter().next() {
        Some(t) if tickers.len() == 1 => Ok(t.as_str()),
        _ => Err(NormalizationError::AmbiguousShape {
            requested: tickers.len(),
        }),
    }
}

/// Row indices in ascending date order; rejects repeated dates.
fn date_order(dates: &[NaiveDate]) -> Result<Vec<usize>, NormalizationError> {
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);
    if let Some(w) = order.windows(2).find(|w| dates[w[0]] == dates[w[1]]) {
        return Err(NormalizationError::DuplicateDate(dates[w[0]]));
    }
    Ok(order)
}
