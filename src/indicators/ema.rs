// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (span + 1)
//   EMA_0      = close_0
//   EMA_t      = EMA_{t-1} + multiplier * (close_t - EMA_{t-1})
//
// (algebraically the usual `close * m + prev * (1 - m)`, but exact on a flat
// series).
//
// The series is seeded at the first observation, so there is no warm-up gap
// and the output is exactly as long as the input.
// =============================================================================

/// Compute the EMA series for `values` with the given `span`.
///
/// # Edge cases
/// - empty input => empty vec
/// - `span == 0` behaves like `span == 1` (the EMA equals the input)
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let multiplier = 2.0 / (span.max(1) as f64 + 1.0);

    let mut result = Vec::with_capacity(values.len());
    let mut prev_ema = first;
    result.push(first);

    for &value in &values[1..] {
        let ema = prev_ema + multiplier * (value - prev_ema);
        result.push(ema);
        prev_ema = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_seeded_at_first_value() {
        let ema = calculate_ema(&[10.0, 20.0, 30.0], 3);
        assert_eq!(ema.len(), 3);
        assert_eq!(ema[0], 10.0);
    }

    #[test]
    fn ema_known_values() {
        // span 3 => multiplier 0.5
        let ema = calculate_ema(&[10.0, 20.0, 30.0], 3);
        assert!((ema[1] - 15.0).abs() < 1e-12);
        assert!((ema[2] - 22.5).abs() < 1e-12);
    }

    #[test]
    fn ema_span_one_tracks_input() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(calculate_ema(&values, 1), values.to_vec());
        assert_eq!(calculate_ema(&values, 0), values.to_vec());
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let ema = calculate_ema(&[42.0; 50], 26);
        assert!(ema.iter().all(|&v| v == 42.0));
    }
}
