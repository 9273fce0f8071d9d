// =============================================================================
// Money-Flow Aggregator — typical price × volume per ticker and date
// =============================================================================
//
// Output is long-form (one row per date × ticker), ticker-major and
// date-ascending within each ticker. Long form tolerates missing
// (date, ticker) pairs; the heatmap matrix is produced by a separate `pivot`
// step which refuses duplicate keys.
//
// A ticker whose OHLCV columns are incomplete is reported in
// `MoneyFlowReport::failures` and contributes no rows. The other tickers are
// unaffected.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AggregationError, PivotConflict};
use crate::market_data::{OhlcvRecord, TickerFrame};

/// Money flow of one ticker on one trading date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoneyFlowRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub money_flow: f64,
}

/// Long-form money-flow rows plus the tickers that could not contribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MoneyFlowReport {
    pub rows: Vec<MoneyFlowRow>,
    pub failures: Vec<(String, AggregationError)>,
}

/// Date × ticker money-flow matrix for heatmap rendering.
///
/// `values[i][j]` is the money flow of `tickers[j]` on `dates[i]`, or `None`
/// when that ticker did not trade that day.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MoneyFlowMatrix {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl MoneyFlowMatrix {
    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let i = self.dates.binary_search(&date).ok()?;
        let j = self.tickers.iter().position(|t| t == ticker)?;
        self.values[i][j]
    }
}

/// Money-flow rows from already-extracted OHLCV records.
pub fn money_flow_rows(records_by_ticker: &BTreeMap<String, Vec<OhlcvRecord>>) -> Vec<MoneyFlowRow> {
    records_by_ticker
        .iter()
        .flat_map(|(ticker, records)| {
            let mut rows: Vec<MoneyFlowRow> = records
                .iter()
                .map(|rec| MoneyFlowRow {
                    date: rec.date,
                    ticker: ticker.clone(),
                    money_flow: rec.money_flow(),
                })
                .collect();
            rows.sort_by_key(|r| r.date);
            rows
        })
        .collect()
}

/// Extract OHLCV records from each frame and compute money flow.
///
/// Tickers missing a required column are collected as failures instead of
/// aborting the whole table.
pub fn money_flow(frames: &BTreeMap<String, TickerFrame>) -> MoneyFlowReport {
    let mut records_by_ticker = BTreeMap::new();
    let mut failures = Vec::new();

    for (ticker, frame) in frames {
        match frame.ohlcv_records() {
            Ok(records) => {
                records_by_ticker.insert(ticker.clone(), records);
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "ticker excluded from money flow");
                failures.push((ticker.clone(), e));
            }
        }
    }

    let rows = money_flow_rows(&records_by_ticker);
    debug!(
        rows = rows.len(),
        tickers = records_by_ticker.len(),
        failed = failures.len(),
        "money flow aggregated"
    );

    MoneyFlowReport { rows, failures }
}

/// Pivot long-form rows into a date × ticker matrix.
///
/// Tickers keep their first-appearance order; dates are ascending.
pub fn pivot(rows: &[MoneyFlowRow]) -> Result<MoneyFlowMatrix, PivotConflict> {
    let mut tickers: Vec<String> = Vec::new();
    let mut ticker_index: HashMap<&str, usize> = HashMap::new();
    let mut cells: HashMap<(NaiveDate, usize), f64> = HashMap::with_capacity(rows.len());
    let mut dates = BTreeSet::new();

    for row in rows {
        let j = *ticker_index.entry(row.ticker.as_str()).or_insert_with(|| {
            tickers.push(row.ticker.clone());
            tickers.len() - 1
        });
        if cells.insert((row.date, j), row.money_flow).is_some() {
            return Err(PivotConflict {
                date: row.date,
                ticker: row.ticker.clone(),
            });
        }
        dates.insert(row.date);
    }

    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let values: Vec<Vec<Option<f64>>> = dates
        .iter()
        .map(|date| {
            (0..tickers.len())
                .map(|j| cells.get(&(*date, j)).copied())
                .collect()
        })
        .collect();

    Ok(MoneyFlowMatrix {
        dates,
        tickers,
        values,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::types::PriceField;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn frame(ticker: &str, days: &[u32], with_volume: bool) -> TickerFrame {
        let n = days.len();
        let mut columns = BTreeMap::new();
        columns.insert(PriceField::High, (0..n).map(|i| 11.0 + i as f64).collect());
        columns.insert(PriceField::Low, (0..n).map(|i| 9.0 + i as f64).collect());
        columns.insert(PriceField::Close, (0..n).map(|i| 10.0 + i as f64).collect());
        if with_volume {
            columns.insert(PriceField::Volume, vec![1000.0; n]);
        }
        TickerFrame {
            ticker: ticker.to_string(),
            dates: days.iter().map(|&x| d(x)).collect(),
            columns,
        }
    }

    fn frames(list: Vec<TickerFrame>) -> BTreeMap<String, TickerFrame> {
        list.into_iter().map(|f| (f.ticker.clone(), f)).collect()
    }

    #[test]
    fn rows_ticker_major_date_ascending() {
        let report = money_flow(&frames(vec![
            frame("MSFT", &[6, 7, 8], true),
            frame("AAPL", &[6, 7], true),
        ]));
        assert!(report.failures.is_empty());
        let keys: Vec<(&str, NaiveDate)> = report
            .rows
            .iter()
            .map(|r| (r.ticker.as_str(), r.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAPL", d(6)),
                ("AAPL", d(7)),
                ("MSFT", d(6)),
                ("MSFT", d(7)),
                ("MSFT", d(8)),
            ]
        );
        // typical price (11 + 9 + 10) / 3 = 10, volume 1000
        assert!((report.rows[0].money_flow - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn row_count_matches_records_and_keys_unique() {
        let input = frames(vec![
            frame("AAPL", &[6, 7, 8, 9, 10], true),
            frame("GOOGL", &[6, 8, 10], true),
            frame("NFLX", &[9], true),
        ]);
        let expected: usize = input
            .values()
            .map(|f| f.ohlcv_records().unwrap().len())
            .sum();
        let report = money_flow(&input);
        assert_eq!(report.rows.len(), expected);

        let unique: HashSet<(NaiveDate, &str)> =
            report.rows.iter().map(|r| (r.date, r.ticker.as_str())).collect();
        assert_eq!(unique.len(), report.rows.len());
        assert!(pivot(&report.rows).is_ok());
    }

    #[test]
    fn missing_volume_is_partial_failure() {
        let report = money_flow(&frames(vec![
            frame("AAPL", &[6, 7], true),
            frame("MSFT", &[6, 7], false),
        ]));
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|r| r.ticker == "AAPL"));
        assert_eq!(
            report.failures,
            vec![(
                "MSFT".to_string(),
                AggregationError::MissingField {
                    ticker: "MSFT".into(),
                    field: PriceField::Volume
                }
            )]
        );
    }

    #[test]
    fn ragged_frame_is_partial_failure() {
        let mut ragged = frame("MSFT", &[6, 7, 8], true);
        ragged.columns.insert(PriceField::Volume, vec![1000.0, 1000.0]);
        let report = money_flow(&frames(vec![frame("AAPL", &[6, 7, 8], true), ragged]));
        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.ticker == "AAPL"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "MSFT");
        assert!(matches!(
            report.failures[0].1,
            AggregationError::RaggedColumn { expected: 3, actual: 2, .. }
        ));
    }

    #[test]
    fn rows_from_unsorted_records_are_sorted() {
        let rec = |day, close| OhlcvRecord {
            date: d(day),
            open: None,
            high: close,
            low: close,
            close,
            volume: 2.0,
        };
        let input = BTreeMap::from([("AAPL".to_string(), vec![rec(8, 3.0), rec(6, 1.0)])]);
        let rows = money_flow_rows(&input);
        assert_eq!(rows[0].date, d(6));
        assert_eq!(rows[0].money_flow, 2.0);
        assert_eq!(rows[1].money_flow, 6.0);
    }

    #[test]
    fn pivot_fills_missing_pairs_with_none() {
        let report = money_flow(&frames(vec![
            frame("AAPL", &[6, 7], true),
            frame("MSFT", &[7, 8], true),
        ]));
        let matrix = pivot(&report.rows).unwrap();
        assert_eq!(matrix.dates, vec![d(6), d(7), d(8)]);
        assert_eq!(matrix.tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(matrix.values.len(), 3);
        assert!(matrix.get(d(6), "AAPL").is_some());
        assert_eq!(matrix.get(d(6), "MSFT"), None);
        assert_eq!(matrix.get(d(8), "AAPL"), None);
        assert!(matrix.get(d(8), "MSFT").is_some());
    }

    #[test]
    fn pivot_rejects_duplicate_keys() {
        let row = MoneyFlowRow {
            date: d(6),
            ticker: "AAPL".into(),
            money_flow: 1.0,
        };
        let err = pivot(&[row.clone(), row]).unwrap_err();
        assert_eq!(
            err,
            PivotConflict {
                date: d(6),
                ticker: "AAPL".into()
            }
        );
    }

    #[test]
    fn pivot_of_nothing_is_empty() {
        let matrix = pivot(&[]).unwrap();
        assert!(matrix.dates.is_empty());
        assert!(matrix.tickers.is_empty());
    }
}
