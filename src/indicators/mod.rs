// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators shown on the
// dashboard. None of them can fail: degenerate input (fewer than two points)
// yields a degenerate but fully defined output.

pub mod ema;
pub mod macd;
pub mod rsi;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use macd::{calculate_macd, MacdLines, MacdParams};
pub use rsi::{calculate_rsi, RsiZone};

/// Window settings for every indicator the dashboard computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_window: usize,
    pub macd: MacdParams,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_window: rsi::DEFAULT_RSI_WINDOW,
            macd: MacdParams::default(),
        }
    }
}

/// Date-keyed indicator series for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerIndicators {
    pub rsi: BTreeMap<NaiveDate, f64>,
    pub macd: BTreeMap<NaiveDate, f64>,
    pub signal: BTreeMap<NaiveDate, f64>,
    pub latest_rsi: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
}

impl TickerIndicators {
    /// Compute RSI and MACD over date-ordered `(date, price)` observations.
    pub fn compute(observations: &[(NaiveDate, f64)], params: &IndicatorParams) -> Self {
        let (dates, closes): (Vec<NaiveDate>, Vec<f64>) = observations.iter().copied().unzip();

        let rsi = calculate_rsi(&closes, params.rsi_window);
        let MacdLines { macd, signal } = calculate_macd(&closes, params.macd);

        let keyed = |values: &[f64]| -> BTreeMap<NaiveDate, f64> {
            dates.iter().copied().zip(values.iter().copied()).collect()
        };

        let latest_rsi = rsi.last().copied();
        Self {
            rsi: keyed(&rsi),
            macd: keyed(&macd),
            signal: keyed(&signal),
            latest_rsi,
            rsi_zone: latest_rsi.map(RsiZone::classify),
        }
    }
}
