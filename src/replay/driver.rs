use crate::engine::SignalEngine;
use crate::models::{Candle, Direction, SignalCandidate};
use crate::strategy::{ConfluenceScorer, Strategy};
use serde::Serialize;

/// A historical signal with its realized outcome
#[derive(Debug, Clone, Serialize)]
pub struct LabeledSignal {
    pub signal: SignalCandidate,
    /// Close of the candle the signal was evaluated on
    pub entry_price: f64,
    /// Close `expiration_minutes` candles later, when available
    pub exit_price: Option<f64>,
    /// `None` when the series ends before expiration
    pub won: Option<bool>,
}

impl LabeledSignal {
    fn label(signal: SignalCandidate, entry_price: f64, exit_price: Option<f64>) -> Self {
        let won = exit_price.map(|exit| match signal.direction {
            Direction::Call => exit > entry_price,
            Direction::Put => exit < entry_price,
        });

        Self {
            signal,
            entry_price,
            exit_price,
            won,
        }
    }
}

/// Walks a historical candle series through the live evaluation path
pub struct ReplayDriver<S: Strategy = ConfluenceScorer> {
    engine: SignalEngine<S>,
    history_capacity: usize,
}

impl<S: Strategy> ReplayDriver<S> {
    /// # Arguments
    /// * `strategy` - Same strategy configuration as the live engine
    /// * `history_capacity` - Window length the live history would hold
    pub fn new(strategy: S, history_capacity: usize) -> Self {
        Self {
            engine: SignalEngine::detached(strategy),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Sort by minute, drop repeated minutes and other instruments' candles
    pub fn normalize(instrument: &str, mut candles: Vec<Candle>) -> Vec<Candle> {
        let before = candles.len();
        candles.retain(|c| c.instrument == instrument);
        candles.sort_by_key(|c| c.minute);
        candles.dedup_by_key(|c| c.minute);

        if candles.len() != before {
            tracing::warn!(
                instrument = %instrument,
                dropped = before - candles.len(),
                "Dropped foreign or duplicate candles before replay"
            );
        }

        candles
    }

    /// Every signal the live engine would have produced, in order
    pub fn replay(&self, instrument: &str, candles: Vec<Candle>) -> Vec<SignalCandidate> {
        self.replay_labeled(instrument, candles)
            .into_iter()
            .map(|l| l.signal)
            .collect()
    }

    /// Replay and label each signal with its outcome
    pub fn replay_labeled(&self, instrument: &str, candles: Vec<Candle>) -> Vec<LabeledSignal> {
        let candles = Self::normalize(instrument, candles);
        let min_candles = self.engine.strategy().min_candles_required();

        if candles.len() < min_candles {
            tracing::warn!(
                instrument = %instrument,
                candles = candles.len(),
                needed = min_candles,
                "Not enough candles for replay"
            );
            return Vec::new();
        }

        tracing::info!(
            instrument = %instrument,
            candles = candles.len(),
            strategy = self.engine.strategy().name(),
            "Starting replay"
        );

        let mut labeled = Vec::new();

        for i in min_candles.saturating_sub(1)..candles.len() {
            let start = (i + 1).saturating_sub(self.history_capacity);
            let window = &candles[start..=i];

            let signal = match self.engine.evaluate(window) {
                Some(s) => s,
                None => continue,
            };

            let expiration = signal.expiration_minutes as usize;
            let exit_price = candles.get(i + expiration).map(|c| c.close);
            labeled.push(LabeledSignal::label(signal, candles[i].close, exit_price));
        }

        tracing::info!(
            instrument = %instrument,
            signals = labeled.len(),
            "Replay finished"
        );

        labeled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConditionSet;
    use chrono::{Duration, TimeZone, Utc};

    /// Fires on every window whose last candle closes above its open
    struct GreenCandleCall;

    impl Strategy for GreenCandleCall {
        fn evaluate(&self, candles: &[Candle]) -> Option<SignalCandidate> {
            let last = candles.last()?;
            if last.close <= last.open {
                return None;
            }
            Some(SignalCandidate {
                instrument: last.instrument.clone(),
                direction: Direction::Call,
                confluence_count: candles.len().min(7) as u8,
                probability: 50.0,
                conditions: ConditionSet::default(),
                entry_minute: last.minute + Duration::minutes(1),
                expiration_minutes: 2,
            })
        }

        fn name(&self) -> &str {
            "GreenCandleCall"
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn candle(instrument: &str, minute: i64, open: f64, close: f64) -> Candle {
        Candle {
            instrument: instrument.to_string(),
            minute: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::minutes(minute),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            tick_count: 3,
        }
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let candles = vec![
            candle("EURUSD", 2, 1.0, 1.0),
            candle("EURUSD", 0, 1.0, 1.0),
            candle("GBPUSD", 1, 1.0, 1.0),
            candle("EURUSD", 2, 9.0, 9.0),
            candle("EURUSD", 1, 1.0, 1.0),
        ];

        let normalized = ReplayDriver::<GreenCandleCall>::normalize("EURUSD", candles);

        assert_eq!(normalized.len(), 3);
        assert!(normalized.windows(2).all(|w| w[0].minute < w[1].minute));
        assert_eq!(normalized[2].open, 1.0);
    }

    #[test]
    fn test_labels_outcomes() {
        let candles = vec![
            candle("EURUSD", 0, 1.0, 1.1), // green, exit at minute 2
            candle("EURUSD", 1, 1.1, 1.0),
            candle("EURUSD", 2, 1.0, 1.2),  // green, exit at minute 4
            candle("EURUSD", 3, 1.2, 1.15),
            candle("EURUSD", 4, 1.15, 1.19), // green, no exit candle
        ];
        let driver = ReplayDriver::new(GreenCandleCall, 100);

        let labeled = driver.replay_labeled("EURUSD", candles);

        assert_eq!(labeled.len(), 3);
        assert_eq!(labeled[0].won, Some(true)); // 1.2 > 1.1
        assert_eq!(labeled[1].won, Some(false)); // 1.19 < 1.2
        assert_eq!(labeled[2].won, None);
        assert_eq!(labeled[2].exit_price, None);
    }

    #[test]
    fn test_window_is_capped_at_capacity() {
        let candles: Vec<Candle> = (0..10).map(|i| candle("EURUSD", i, 1.0, 1.1)).collect();
        let driver = ReplayDriver::new(GreenCandleCall, 3);

        let signals = driver.replay("EURUSD", candles);

        // confluence_count mirrors the window length (capped at 7)
        assert_eq!(signals.len(), 10);
        assert_eq!(signals[0].confluence_count, 1);
        assert_eq!(signals[1].confluence_count, 2);
        assert!(signals[2..].iter().all(|s| s.confluence_count == 3));
    }

    #[test]
    fn test_confluence_replay_needs_warmup() {
        let candles: Vec<Candle> = (0..49).map(|i| candle("EURUSD", i, 1.0, 1.0)).collect();
        let driver = ReplayDriver::new(ConfluenceScorer::default(), 2000);

        assert!(driver.replay("EURUSD", candles).is_empty());
    }
}
