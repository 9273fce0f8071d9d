use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, NormalizationError};
use crate::types::PriceField;

// ---------------------------------------------------------------------------
// Raw provider table
// ---------------------------------------------------------------------------

/// Column layout of a raw provider table.
///
/// Provider responses come in exactly one of these two shapes. Nothing else
/// in the crate inspects the layout; see [`crate::market_data::normalizer`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableColumns {
    /// Single-ticker response: one column per field.
    Flat(BTreeMap<PriceField, Vec<f64>>),
    /// Multi-ticker response: field outer, ticker inner.
    Nested(BTreeMap<PriceField, BTreeMap<String, Vec<f64>>>),
}

/// Raw, untrusted price table as returned by a market-data provider.
///
/// Every column has one value per entry of `dates`; missing observations are
/// `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: TableColumns,
}

impl PriceTable {
    pub fn flat(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<PriceField, Vec<f64>>,
    ) -> Result<Self, NormalizationError> {
        for (field, values) in &columns {
            check_len(field.as_str(), dates.len(), values.len())?;
        }
        Ok(Self {
            dates,
            columns: TableColumns::Flat(columns),
        })
    }

    pub fn nested(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<PriceField, BTreeMap<String, Vec<f64>>>,
    ) -> Result<Self, NormalizationError> {
        for (field, by_ticker) in &columns {
            for (ticker, values) in by_ticker {
                check_len(&format!("{field}/{ticker}"), dates.len(), values.len())?;
            }
        }
        Ok(Self {
            dates,
            columns: TableColumns::Nested(columns),
        })
    }

    /// A table with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            columns: TableColumns::Flat(BTreeMap::new()),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &TableColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Field names present at the outer level, for diagnostics.
    pub fn field_names(&self) -> Vec<String> {
        let fields: Vec<&PriceField> = match &self.columns {
            TableColumns::Flat(cols) => cols.keys().collect(),
            TableColumns::Nested(cols) => cols.keys().collect(),
        };
        fields.into_iter().map(|f| f.to_string()).collect()
    }
}

fn check_len(column: &str, expected: usize, actual: usize) -> Result<(), NormalizationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(NormalizationError::RaggedColumn {
            column: column.to_string(),
            expected,
            actual,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-ticker OHLCV view
// ---------------------------------------------------------------------------

/// One trading period for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Share count; may be fractional after upstream adjustments.
    pub volume: f64,
}

impl OhlcvRecord {
    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Typical price times traded volume.
    pub fn money_flow(&self) -> f64 {
        self.typical_price() * self.volume
    }
}

/// All columns of a raw table that belong to a single ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFrame {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<PriceField, Vec<f64>>,
}

impl TickerFrame {
    const REQUIRED: [PriceField; 4] = [
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];

    /// Convert the frame into OHLCV records.
    ///
    /// High, Low, Close and Volume must all be present, and every column
    /// must have one value per date. Dates where any required value is NaN
    /// are skipped: they are holes in the shared date index, not trading days
    /// of this ticker.
    pub fn ohlcv_records(&self) -> Result<Vec<OhlcvRecord>, AggregationError> {
        for field in Self::REQUIRED {
            if !self.columns.contains_key(&field) {
                return Err(AggregationError::MissingField {
                    ticker: self.ticker.clone(),
                    field,
                });
            }
        }
        if let Some((field, values)) = self
            .columns
            .iter()
            .find(|(_, values)| values.len() != self.dates.len())
        {
            return Err(AggregationError::RaggedColumn {
                ticker: self.ticker.clone(),
                field: *field,
                expected: self.dates.len(),
                actual: values.len(),
            });
        }

        let col = |field: PriceField| &self.columns[&field];
        let (high, low, close, volume) = (
            col(PriceField::High),
            col(PriceField::Low),
            col(PriceField::Close),
            col(PriceField::Volume),
        );
        let open = self.columns.get(&PriceField::Open);

        let records = self
            .dates
            .iter()
            .enumerate()
            .filter(|&(i, _)| {
                [high[i], low[i], close[i], volume[i]]
                    .iter()
                    .all(|v| v.is_finite())
            })
            .map(|(i, &date)| OhlcvRecord {
                date,
                open: open.map(|o| o[i]).filter(|v| v.is_finite()),
                high: high[i],
                low: low[i],
                close: close[i],
                volume: volume[i],
            })
            .collect();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn ragged_columns_rejected() {
        let mut cols = BTreeMap::new();
        cols.insert(PriceField::Close, vec![1.0, 2.0]);
        let err = PriceTable::flat(vec![d(1), d(4), d(5)], cols).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::RaggedColumn {
                column: "Close".into(),
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn nested_ragged_column_names_ticker() {
        let mut inner = BTreeMap::new();
        inner.insert("AAPL".to_string(), vec![1.0]);
        let mut cols = BTreeMap::new();
        cols.insert(PriceField::Close, inner);
        let err = PriceTable::nested(vec![d(1), d(4)], cols).unwrap_err();
        assert!(matches!(err, NormalizationError::RaggedColumn { ref column, .. } if column == "Close/AAPL"));
    }

    #[test]
    fn typical_price_and_money_flow() {
        let rec = OhlcvRecord {
            date: d(1),
            open: None,
            high: 12.0,
            low: 9.0,
            close: 12.0,
            volume: 100.0,
        };
        assert!((rec.typical_price() - 11.0).abs() < 1e-12);
        assert!((rec.money_flow() - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn ohlcv_records_skip_holes() {
        let mut columns = BTreeMap::new();
        columns.insert(PriceField::High, vec![2.0, f64::NAN, 4.0]);
        columns.insert(PriceField::Low, vec![1.0, f64::NAN, 3.0]);
        columns.insert(PriceField::Close, vec![1.5, f64::NAN, 3.5]);
        columns.insert(PriceField::Volume, vec![10.0, f64::NAN, 20.0]);
        let frame = TickerFrame {
            ticker: "MSFT".into(),
            dates: vec![d(1), d(4), d(5)],
            columns,
        };
        let records = frame.ohlcv_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(1));
        assert_eq!(records[1].date, d(5));
        assert_eq!(records[0].open, None);
    }

    #[test]
    fn ohlcv_records_missing_volume() {
        let mut columns = BTreeMap::new();
        columns.insert(PriceField::High, vec![2.0]);
        columns.insert(PriceField::Low, vec![1.0]);
        columns.insert(PriceField::Close, vec![1.5]);
        let frame = TickerFrame {
            ticker: "TSLA".into(),
            dates: vec![d(1)],
            columns,
        };
        assert_eq!(
            frame.ohlcv_records().unwrap_err(),
            AggregationError::MissingField {
                ticker: "TSLA".into(),
                field: PriceField::Volume
            }
        );
    }

    #[test]
    fn ohlcv_records_short_column_is_an_error() {
        let mut columns = BTreeMap::new();
        columns.insert(PriceField::High, vec![2.0, 3.0, 4.0]);
        columns.insert(PriceField::Low, vec![1.0, 2.0, 3.0]);
        columns.insert(PriceField::Close, vec![1.5, 2.5, 3.5]);
        columns.insert(PriceField::Volume, vec![10.0, 20.0]);
        let frame = TickerFrame {
            ticker: "NFLX".into(),
            dates: vec![d(1), d(2), d(3)],
            columns,
        };
        assert_eq!(
            frame.ohlcv_records().unwrap_err(),
            AggregationError::RaggedColumn {
                ticker: "NFLX".into(),
                field: PriceField::Volume,
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn ohlcv_records_checks_optional_open_length() {
        let mut columns = BTreeMap::new();
        columns.insert(PriceField::Open, vec![1.0]);
        columns.insert(PriceField::High, vec![2.0, 3.0]);
        columns.insert(PriceField::Low, vec![1.0, 2.0]);
        columns.insert(PriceField::Close, vec![1.5, 2.5]);
        columns.insert(PriceField::Volume, vec![10.0, 20.0]);
        let frame = TickerFrame {
            ticker: "AMZN".into(),
            dates: vec![d(1), d(2)],
            columns,
        };
        assert!(matches!(
            frame.ohlcv_records(),
            Err(AggregationError::RaggedColumn { field: PriceField::Open, .. })
        ));
    }
}
