// =============================================================================
// Moving Average Convergence / Divergence (MACD)
// =============================================================================
//
//   macd_line   = EMA(close, short) - EMA(close, long)
//   signal_line = EMA(macd_line, signal)
//
// Both EMAs are seeded at the first observation, so both lines are defined
// from index 0 and have the same length as the input.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::calculate_ema;

pub const DEFAULT_SHORT_WINDOW: usize = 12;
pub const DEFAULT_LONG_WINDOW: usize = 26;
pub const DEFAULT_SIGNAL_WINDOW: usize = 9;

/// Spans used for a MACD computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub short_window: usize,
    pub long_window: usize,
    pub signal_window: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            signal_window: DEFAULT_SIGNAL_WINDOW,
        }
    }
}

/// MACD and signal lines, index-aligned with the input series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
}

/// Compute the MACD and signal lines for `closes`.
pub fn calculate_macd(closes: &[f64], params: MacdParams) -> MacdLines {
    let short = calculate_ema(closes, params.short_window);
    let long = calculate_ema(closes, params.long_window);

    let macd: Vec<f64> = short.iter().zip(&long).map(|(s, l)| s - l).collect();
    let signal = calculate_ema(&macd, params.signal_window);

    MacdLines { macd, signal }
}
