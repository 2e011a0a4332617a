use super::Strategy;
use crate::config::{IndicatorSettings, Settings, WeightTable};
use crate::indicators::{
    bollinger_touch, calculate_ema, calculate_rsi, calculate_support_resistance, is_hammer,
    is_near_level, is_shooting_star, latest_bollinger_bands, BandTouch,
};
use crate::models::{Candle, ConditionSet, Direction, IndicatorSnapshot, SignalCandidate};
use chrono::Duration;

/// Configuration for confluence scoring
#[derive(Debug, Clone, PartialEq)]
pub struct ConfluenceConfig {
    pub indicators: IndicatorSettings,
    pub weights: WeightTable,
    pub min_confluences: u8,
    pub warmup_candles: usize,
    pub expiration_minutes: u32,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorSettings::default(),
            weights: WeightTable::default(),
            min_confluences: 3,
            warmup_candles: 50,
            expiration_minutes: 2,
        }
    }
}

impl ConfluenceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            indicators: settings.indicators.clone(),
            weights: settings.weights.clone(),
            min_confluences: settings.engine.min_confluences,
            warmup_candles: settings.engine.warmup_candles,
            expiration_minutes: settings.engine.expiration_minutes,
        }
    }
}

/// Score of one direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredSide {
    pub direction: Direction,
    pub conditions: ConditionSet,
    pub confluence_count: u8,
    pub probability: f64,
}

/// Pick the winning side. Both sides need `min_confluences`; when both
/// qualify the strictly higher probability wins and CALL wins ties.
pub fn select_side(call: ScoredSide, put: ScoredSide, min_confluences: u8) -> Option<ScoredSide> {
    let call_ok = call.confluence_count >= min_confluences;
    let put_ok = put.confluence_count >= min_confluences;

    match (call_ok, put_ok) {
        (true, true) if put.probability > call.probability => Some(put),
        (true, _) => Some(call),
        (false, true) => Some(put),
        (false, false) => None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stateless CALL/PUT confluence scorer over a candle history
#[derive(Debug, Clone, Default)]
pub struct ConfluenceScorer {
    config: ConfluenceConfig,
}

impl ConfluenceScorer {
    pub fn new(config: ConfluenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfluenceConfig {
        &self.config
    }

    /// Indicator values at the last candle; `None` before warm-up
    pub fn snapshot(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        if candles.len() < self.config.warmup_candles.max(1) {
            return None;
        }
        let p = &self.config.indicators;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let ema_short = *calculate_ema(&closes, p.ema_short).last()?;
        let ema_long = *calculate_ema(&closes, p.ema_long).last()?;
        let rsi = *calculate_rsi(&closes, p.rsi_period).last()?;
        let bands = latest_bollinger_bands(&closes, p.bb_period, p.bb_std)?;
        let (support, resistance) = calculate_support_resistance(&highs, &lows, p.sr_lookback)?;

        Some(IndicatorSnapshot {
            ema_short,
            ema_long,
            rsi,
            bb_upper: bands.upper,
            bb_mid: bands.mid,
            bb_lower: bands.lower,
            support,
            resistance,
        })
    }

    /// Build the CALL and PUT condition sets for the last candle
    pub fn conditions(
        &self,
        candles: &[Candle],
        snap: &IndicatorSnapshot,
    ) -> Option<(ConditionSet, ConditionSet)> {
        let p = &self.config.indicators;
        let last = candles.last()?;
        let price = last.close;

        let price_above_emas = price > snap.ema_short && price > snap.ema_long;
        let touch = bollinger_touch(price, snap.bb_upper, snap.bb_lower, p.band_proximity);
        let rising_volume = match candles {
            [.., prev, last] => last.tick_count > prev.tick_count,
            _ => false,
        };
        // NaN RSI fails both range checks
        let rsi = snap.rsi;

        let call = ConditionSet {
            ema_trend: snap.ema_short > snap.ema_long,
            price_vs_emas: price_above_emas,
            rsi_zone: (30.0..=50.0).contains(&rsi),
            bollinger_touch: touch == Some(BandTouch::Lower),
            candle_pattern: is_hammer(last),
            volume: rising_volume,
            support_resistance: is_near_level(price, snap.support, p.sr_proximity),
        };

        let put = ConditionSet {
            ema_trend: snap.ema_short < snap.ema_long,
            price_vs_emas: !price_above_emas,
            rsi_zone: (50.0..=70.0).contains(&rsi),
            bollinger_touch: touch == Some(BandTouch::Upper),
            candle_pattern: is_shooting_star(last),
            volume: rising_volume,
            support_resistance: is_near_level(price, snap.resistance, p.sr_proximity),
        };

        Some((call, put))
    }

    /// Weighted score of a condition set, normalized to 0..=100
    pub fn score(&self, direction: Direction, conditions: ConditionSet) -> ScoredSide {
        let weights = &self.config.weights;
        let score: f64 = conditions
            .iter()
            .filter(|(_, hit)| *hit)
            .map(|(c, _)| weights.weight(c))
            .sum();
        let total = weights.total();
        let probability = if total > 0.0 {
            round2(score / total * 100.0)
        } else {
            0.0
        };

        ScoredSide {
            direction,
            conditions,
            confluence_count: conditions.confluence_count(),
            probability,
        }
    }

    /// Evaluate the most recent candle; `None` when no side qualifies
    /// or the history is shorter than the warm-up
    pub fn evaluate(&self, candles: &[Candle]) -> Option<SignalCandidate> {
        let snap = self.snapshot(candles)?;
        let (call_set, put_set) = self.conditions(candles, &snap)?;
        let last = candles.last()?;

        let call = self.score(Direction::Call, call_set);
        let put = self.score(Direction::Put, put_set);

        tracing::debug!(
            "{} indicators: EMA={:.5}/{:.5}, RSI={:.1}, BB={:.5}/{:.5}, S/R={:.5}/{:.5} | CALL {}/7 {:.2}% PUT {}/7 {:.2}%",
            last.instrument,
            snap.ema_short,
            snap.ema_long,
            snap.rsi,
            snap.bb_lower,
            snap.bb_upper,
            snap.support,
            snap.resistance,
            call.confluence_count,
            call.probability,
            put.confluence_count,
            put.probability
        );

        let winner = select_side(call, put, self.config.min_confluences)?;

        Some(SignalCandidate {
            instrument: last.instrument.clone(),
            direction: winner.direction,
            confluence_count: winner.confluence_count,
            probability: winner.probability,
            conditions: winner.conditions,
            entry_minute: last.minute + Duration::minutes(1),
            expiration_minutes: self.config.expiration_minutes,
        })
    }
}

impl Strategy for ConfluenceScorer {
    fn evaluate(&self, candles: &[Candle]) -> Option<SignalCandidate> {
        ConfluenceScorer::evaluate(self, candles)
    }

    fn name(&self) -> &str {
        "Confluence"
    }

    fn min_candles_required(&self) -> usize {
        self.config.warmup_candles
    }
}
