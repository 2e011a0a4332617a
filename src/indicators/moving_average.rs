/// Calculate Simple Moving Average (SMA) of the most recent `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) series
///
/// Seeded with the first price (no SMA warm-up), so the output has exactly
/// one value per input:
/// - y[0] = x[0]
/// - y[t] = α·x[t] + (1 − α)·y[t−1], α = 2 / (period + 1)
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);

    let mut out = Vec::with_capacity(prices.len());
    let mut iter = prices.iter();

    if let Some(&first) = iter.next() {
        let mut ema = first;
        out.push(ema);
        for &price in iter {
            ema = (price - ema) * alpha + ema;
            out.push(ema);
        }
    }

    out
}
