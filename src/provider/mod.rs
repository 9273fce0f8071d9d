// =============================================================================
// Market-data provider boundary
// =============================================================================
//
// The provider is the only external resource the dashboard touches. Its
// tables are not trusted: the shape depends on how many tickers were asked for
// and on the provider version. `assemble_table` reproduces that variability
// (one ticker => flat, several => field/ticker nested) so that the normaliser
// is the one place that deals with it.
// =============================================================================

pub mod yahoo;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ProviderError;
use crate::market_data::{PriceTable, TickerFrame};
use crate::types::PriceField;

pub use yahoo::YahooClient;

/// Source of daily OHLCV price tables.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for `[start, end)`.
    async fn fetch_range(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, ProviderError>;

    /// Bars for a trailing period such as `"5d"` at `interval` (e.g. `"1d"`).
    async fn fetch_period(
        &self,
        tickers: &[String],
        period: &str,
        interval: &str,
    ) -> Result<PriceTable, ProviderError>;
}

/// Outer-join per-ticker frames on date into one provider-shaped table.
///
/// Dates missing for a ticker become NaN. A single frame produces a flat
/// table; several produce a nested (field, ticker) table. Frames without rows
/// contribute nothing, so all-empty input gives an empty table.
pub fn assemble_table(frames: &[TickerFrame]) -> Result<PriceTable, ProviderError> {
    let dates: Vec<NaiveDate> = frames
        .iter()
        .flat_map(|f| f.dates.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if dates.is_empty() {
        return Ok(PriceTable::empty());
    }

    let reindex = |frame: &TickerFrame, values: &[f64]| -> Vec<f64> {
        let by_date: BTreeMap<NaiveDate, f64> =
            frame.dates.iter().copied().zip(values.iter().copied()).collect();
        dates
            .iter()
            .map(|d| by_date.get(d).copied().unwrap_or(f64::NAN))
            .collect()
    };

    let table = match frames {
        [single] => {
            let columns = single
                .columns
                .iter()
                .map(|(field, values)| (*field, reindex(single, values.as_slice())))
                .collect();
            PriceTable::flat(dates, columns)
        }
        _ => {
            let mut columns: BTreeMap<PriceField, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
            for frame in frames {
                for (field, values) in &frame.columns {
                    columns
                        .entry(*field)
                        .or_default()
                        .insert(frame.ticker.clone(), reindex(frame, values.as_slice()));
                }
            }
            PriceTable::nested(dates, columns)
        }
    };

    table.map_err(|e| ProviderError::Parse(e.to_string()))
}

// =============================================================================
// In-memory provider for tests
// =============================================================================
#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves fixed tables and counts calls.
    #[derive(Debug)]
    pub struct StaticProvider {
        pub range_table: PriceTable,
        pub period_table: PriceTable,
        pub range_calls: AtomicUsize,
        pub period_calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn new(range_table: PriceTable, period_table: PriceTable) -> Self {
            Self {
                range_table,
                period_table,
                range_calls: AtomicUsize::new(0),
                period_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for StaticProvider {
        async fn fetch_range(
            &self,
            _tickers: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceTable, ProviderError> {
            self.range_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.range_table.clone())
        }

        async fn fetch_period(
            &self,
            _tickers: &[String],
            _period: &str,
            _interval: &str,
        ) -> Result<PriceTable, ProviderError> {
            self.period_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.period_table.clone())
        }
    }

    /// Always fails with a non-transient status error.
    #[derive(Debug, Default)]
    pub struct FailingProvider;

    #[async_trait]
    impl MarketDataProvider for FailingProvider {
        async fn fetch_range(
            &self,
            _tickers: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceTable, ProviderError> {
            Err(ProviderError::Status {
                status: 403,
                body: "forbidden".into(),
            })
        }

        async fn fetch_period(
            &self,
            _tickers: &[String],
            _period: &str,
            _interval: &str,
        ) -> Result<PriceTable, ProviderError> {
            Err(ProviderError::Status {
                status: 403,
                body: "forbidden".into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::TableColumns;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn frame(ticker: &str, days: &[u32], closes: &[f64]) -> TickerFrame {
        TickerFrame {
            ticker: ticker.into(),
            dates: days.iter().map(|&x| d(x)).collect(),
            columns: BTreeMap::from([(PriceField::Close, closes.to_vec())]),
        }
    }

    #[test]
    fn single_frame_gives_flat_table() {
        let table = assemble_table(&[frame("AAPL", &[1, 2], &[1.0, 2.0])]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(matches!(table.columns(), TableColumns::Flat(_)));
    }

    #[test]
    fn many_frames_outer_joined_into_nested_table() {
        let table = assemble_table(&[
            frame("AAPL", &[1, 2], &[1.0, 2.0]),
            frame("MSFT", &[2, 3], &[20.0, 30.0]),
        ])
        .unwrap();
        assert_eq!(table.dates(), &[d(1), d(2), d(3)]);
        match table.columns() {
            TableColumns::Nested(cols) => {
                let close = &cols[&PriceField::Close];
                assert_eq!(close["AAPL"][..2], [1.0, 2.0]);
                assert!(close["AAPL"][2].is_nan());
                assert!(close["MSFT"][0].is_nan());
                assert_eq!(close["MSFT"][1..], [20.0, 30.0]);
            }
            other => panic!("expected nested table, got {other:?}"),
        }
    }

    #[test]
    fn all_empty_frames_give_empty_table() {
        let table = assemble_table(&[frame("ZZZZ", &[], &[])]).unwrap();
        assert!(table.is_empty());
        assert!(assemble_table(&[]).unwrap().is_empty());
    }
}
