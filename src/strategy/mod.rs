// Signal strategy module
pub mod confluence;

pub use confluence::{ConfluenceConfig, ConfluenceScorer, ScoredSide};

use crate::models::{Candle, SignalCandidate};

/// Base trait for signal strategies
///
/// Implementations are pure: the same history always yields the same result.
pub trait Strategy: Send + Sync {
    /// Evaluate the most recent candle of `candles` (oldest first)
    fn evaluate(&self, candles: &[Candle]) -> Option<SignalCandidate>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required before the strategy can emit anything
    fn min_candles_required(&self) -> usize;
}
