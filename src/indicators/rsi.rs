// =============================================================================
// Relative Strength Index (RSI) — expanding simple-average variant
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — First differences of consecutive closes. The first position has no
//          prior close and counts as a zero change, so output length equals
//          input length.
// Step 2 — gain = max(diff, 0), loss = max(-diff, 0).
// Step 3 — Simple moving average of gains and losses over `window` periods.
//          The first `window - 1` positions average over whatever is
//          available (minimum one period) instead of being left undefined.
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Unlike textbook Wilder RSI this is defined from the very first close.
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

pub const DEFAULT_RSI_WINDOW: usize = 14;

const OVERBOUGHT: f64 = 70.0;
const OVERSOLD: f64 = 30.0;

/// Classification of an RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn classify(value: f64) -> Self {
        if value >= OVERBOUGHT {
            Self::Overbought
        } else if value <= OVERSOLD {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Compute the full RSI series for the given `closes` and `window`.
///
/// One value per close, every value in `[0, 100]`, never NaN for finite
/// input.
///
/// # Edge cases
/// - empty input => empty vec
/// - a single close => `[50.0]`
/// - `window == 0` behaves like `window == 1`
/// - average loss zero with gains => 100.0; no movement at all => 50.0
pub fn calculate_rsi(closes: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);

    // --- Gains / losses with a zero change at position 0 ---------------------
    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let diff = if i == 0 { 0.0 } else { close - closes[i - 1] };
            (diff.max(0.0), (-diff).max(0.0))
        })
        .unzip();

    // --- Expanding-then-rolling simple averages ------------------------------
    (0..closes.len())
        .map(|t| {
            let start = (t + 1).saturating_sub(window);
            let n = (t + 1 - start) as f64;
            let avg_gain = gains[start..=t].iter().sum::<f64>() / n;
            let avg_loss = losses[start..=t].iter().sum::<f64>() / n;
            rsi_from_averages(avg_gain, avg_loss)
        })
        .collect()
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
    }
}
