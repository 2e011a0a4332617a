use crate::models::{floor_to_minute, Candle};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Small positive drift per minute
    Uptrend,
    /// Small negative drift per minute
    Downtrend,
    /// Mean-reverting around the starting price
    Sideways,
    /// Large swings, no drift
    Volatile,
}

impl std::str::FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uptrend" | "up" => Ok(MarketScenario::Uptrend),
            "downtrend" | "down" => Ok(MarketScenario::Downtrend),
            "sideways" | "flat" => Ok(MarketScenario::Sideways),
            "volatile" => Ok(MarketScenario::Volatile),
            other => Err(format!("unknown scenario: {}", other)),
        }
    }
}

/// Generates reproducible one-minute candles for replay
pub struct SyntheticCandleGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticCandleGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1.1,
        }
    }

    /// Generate `num_candles` consecutive minutes starting at `start`
    pub fn generate(
        &mut self,
        instrument: &str,
        scenario: MarketScenario,
        num_candles: usize,
        start: DateTime<Utc>,
    ) -> Vec<Candle> {
        let start = floor_to_minute(start);
        let (drift, noise) = match scenario {
            MarketScenario::Uptrend => (0.00005, 0.0004),
            MarketScenario::Downtrend => (-0.00005, 0.0004),
            MarketScenario::Sideways => (0.0, 0.0003),
            MarketScenario::Volatile => (0.0, 0.002),
        };

        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;

        for i in 0..num_candles {
            let open = price;
            let mut ret = drift + self.rng.gen_range(-noise..noise);

            // Pull back toward the base price
            if scenario == MarketScenario::Sideways {
                ret -= (price - self.base_price) / self.base_price * 0.05;
            }

            let close = (open * (1.0 + ret)).max(f64::EPSILON);
            let upper_wick = open.max(close) * self.rng.gen_range(0.0..noise);
            let lower_wick = open.min(close) * self.rng.gen_range(0.0..noise);

            candles.push(Candle {
                instrument: instrument.to_string(),
                minute: start + Duration::minutes(i as i64),
                open,
                high: open.max(close) + upper_wick,
                low: (open.min(close) - lower_wick).max(f64::EPSILON),
                close,
                tick_count: self.rng.gen_range(1..=60),
            });

            price = close;
        }

        candles
    }
}
