/// Guards the RS ratio against a zero average loss
pub const RSI_EPSILON: f64 = 1e-9;

/// Calculate Relative Strength Index (RSI) series
///
/// Uses simple rolling means of gains and losses (not Wilder smoothing):
/// rs = avg_gain / (avg_loss + ε), rsi = 100 − 100 / (1 + rs).
///
/// The first `period` values are NaN; callers treat NaN as insufficient data.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; prices.len()];
    if period == 0 || prices.len() <= period {
        return out;
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    // Calculate price changes
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    // gains[i - 1] is the change ending at prices[i]
    for i in period..prices.len() {
        let window = i - period..i;
        let avg_gain: f64 = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss: f64 = losses[window].iter().sum::<f64>() / period as f64;

        let rs = avg_gain / (avg_loss + RSI_EPSILON);
        out[i] = 100.0 - (100.0 / (1.0 + rs));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_calculation() {
        // Test with known values
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5,
        ];

        let rsi = calculate_rsi(&prices, 14);
        assert_eq!(rsi.len(), prices.len());

        let rsi_value = *rsi.last().unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
    }

    #[test]
    fn test_rsi_warm_up_is_nan() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&prices, 14);

        assert!(rsi[..14].iter().all(|v| v.is_nan()));
        assert!(rsi[14..].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rsi_all_gains_approaches_100() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&prices, 14);
        assert!(*rsi.last().unwrap() > 99.99);
    }

    #[test]
    fn test_rsi_all_losses_approaches_0() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&prices, 14);
        assert!(*rsi.last().unwrap() < 0.01);
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // Alternating +1 / -1 gives equal gains and losses
        let prices: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let rsi = calculate_rsi(&prices, 14);
        assert!((rsi.last().unwrap() - 50.0).abs() < 1e-6);
    }
}
