use super::moving_average::calculate_sma;

/// Bollinger Bands at one point of the series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands series
///
/// mid = SMA(period), band = k · sample stddev(period).
/// The first `period − 1` entries are `None`.
pub fn calculate_bollinger_bands(
    prices: &[f64],
    period: usize,
    std_multiplier: f64,
) -> Vec<Option<BollingerBands>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }

    for end in period..=prices.len() {
        let window = &prices[end - period..end];
        out[end - 1] = bands_for_window(window, std_multiplier);
    }

    out
}

/// Bollinger Bands of the most recent `period` prices
pub fn latest_bollinger_bands(
    prices: &[f64],
    period: usize,
    std_multiplier: f64,
) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }
    bands_for_window(&prices[prices.len() - period..], std_multiplier)
}

fn bands_for_window(window: &[f64], std_multiplier: f64) -> Option<BollingerBands> {
    let mid = calculate_sma(window, window.len())?;
    let sd = sample_std_dev(window, mid);
    let band = std_multiplier * sd;

    Some(BollingerBands {
        upper: mid + band,
        mid,
        lower: mid - band,
    })
}

/// Sample standard deviation (n − 1 denominator); 0 for a single point
fn sample_std_dev(window: &[f64], mean: f64) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (window.len() - 1) as f64;
    var.sqrt()
}
