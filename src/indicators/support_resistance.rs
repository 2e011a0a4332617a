/// Default number of candles scanned for support/resistance
pub const DEFAULT_SR_LOOKBACK: usize = 50;

/// Support = lowest low and resistance = highest high over the last `lookback` points.
///
/// Returns `None` when there is no history.
pub fn calculate_support_resistance(
    highs: &[f64],
    lows: &[f64],
    lookback: usize,
) -> Option<(f64, f64)> {
    if highs.is_empty() || lows.is_empty() || lookback == 0 {
        return None;
    }

    let support = lows
        .iter()
        .rev()
        .take(lookback)
        .fold(f64::INFINITY, |min, &l| min.min(l));
    let resistance = highs
        .iter()
        .rev()
        .take(lookback)
        .fold(f64::NEG_INFINITY, |max, &h| max.max(h));

    Some((support, resistance))
}

/// Whether `price` is strictly within `tolerance` (fraction) of `level`
pub fn is_near_level(price: f64, level: f64, tolerance: f64) -> bool {
    level != 0.0 && ((price - level) / level).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_only_lookback_window() {
        let highs = vec![500.0, 10.0, 12.0, 11.0];
        let lows = vec![1.0, 8.0, 9.0, 7.5];

        let (support, resistance) = calculate_support_resistance(&highs, &lows, 3).unwrap();
        assert_eq!(support, 7.5);
        assert_eq!(resistance, 12.0);
    }

    #[test]
    fn test_short_history() {
        let (support, resistance) = calculate_support_resistance(&[5.0], &[4.0], 50).unwrap();
        assert_eq!(support, 4.0);
        assert_eq!(resistance, 5.0);
    }

    #[test]
    fn test_empty_history() {
        assert!(calculate_support_resistance(&[], &[], 50).is_none());
    }

    #[test]
    fn test_near_level() {
        assert!(is_near_level(100.3, 100.0, 0.005));
        assert!(!is_near_level(100.6, 100.0, 0.005));
        assert!(!is_near_level(1.0, 0.0, 0.005));
    }
}
