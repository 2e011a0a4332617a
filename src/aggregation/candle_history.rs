use crate::error::HistoryError;
use crate::models::Candle;
use std::collections::VecDeque;

/// Bounded rolling window of closed candles for one instrument
///
/// Candles are strictly increasing by minute; once full, the oldest candle
/// is evicted first.
#[derive(Debug, Clone)]
pub struct CandleHistory {
    candles: VecDeque<Candle>,
    max_candles: usize,
}

impl CandleHistory {
    /// Create an empty history
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles to keep
    pub fn new(max_candles: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(max_candles.min(4096)),
            max_candles,
        }
    }

    /// Append a closed candle, returning the evicted candle if the history was full
    pub fn push(&mut self, candle: Candle) -> Result<Option<Candle>, HistoryError> {
        if let Some(last) = self.candles.back() {
            if candle.minute <= last.minute {
                return Err(HistoryError::OutOfOrder {
                    instrument: candle.instrument,
                    minute: candle.minute,
                    last: last.minute,
                });
            }
        }

        self.candles.push_back(candle);

        if self.candles.len() > self.max_candles {
            return Ok(self.candles.pop_front());
        }
        Ok(None)
    }

    /// Candles in chronological order as one slice
    pub fn as_slice(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_candles
    }
}
