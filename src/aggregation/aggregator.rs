use super::CandleHistory;
use crate::models::{floor_to_minute, Candle, Tick};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Running OHLC of a minute that has not closed yet
#[derive(Debug, Clone)]
struct OpenMinute {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_count: u32,
}

impl OpenMinute {
    fn new(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 1,
        }
    }

    fn add(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.tick_count += 1;
    }

    fn into_candle(self, instrument: &str, minute: DateTime<Utc>) -> Candle {
        Candle {
            instrument: instrument.to_string(),
            minute,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            tick_count: self.tick_count,
        }
    }
}

/// Aggregation context of a single instrument: open-minute buffer plus closed history
///
/// Ticks must be fed in arrival order; open and close follow arrival order,
/// not event time. A minute closes only when a tick from a later minute arrives.
#[derive(Debug, Clone)]
pub struct InstrumentAggregator {
    instrument: String,
    pending: BTreeMap<DateTime<Utc>, OpenMinute>,
    history: CandleHistory,
}

impl InstrumentAggregator {
    pub fn new(instrument: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            instrument: instrument.into(),
            pending: BTreeMap::new(),
            history: CandleHistory::new(history_capacity),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Fold one tick into the buffer and return every candle it closed
    ///
    /// Usually zero or one candle; several when the buffer spans more than
    /// two minutes (ticks arriving out of event-time order).
    pub fn ingest(&mut self, event_time: DateTime<Utc>, price: f64) -> Vec<Candle> {
        if !price.is_finite() || price <= 0.0 {
            tracing::warn!(
                instrument = %self.instrument,
                price = %price,
                "Dropping tick with invalid price"
            );
            return Vec::new();
        }

        let minute = floor_to_minute(event_time);

        if let Some(last) = self.history.last() {
            if minute <= last.minute {
                tracing::debug!(
                    instrument = %self.instrument,
                    minute = %minute,
                    "Dropping late tick for an already closed minute"
                );
                return Vec::new();
            }
        }

        self.pending
            .entry(minute)
            .and_modify(|m| m.add(price))
            .or_insert_with(|| OpenMinute::new(price));

        self.close_elapsed_minutes()
    }

    /// Move every minute older than the newest buffered minute into history
    fn close_elapsed_minutes(&mut self) -> Vec<Candle> {
        let newest = match self.pending.keys().next_back() {
            Some(m) => *m,
            None => return Vec::new(),
        };

        let still_open = self.pending.split_off(&newest);
        let elapsed = std::mem::replace(&mut self.pending, still_open);

        let mut closed = Vec::with_capacity(elapsed.len());
        for (minute, bucket) in elapsed {
            let candle = bucket.into_candle(&self.instrument, minute);
            match self.history.push(candle.clone()) {
                Ok(_) => closed.push(candle),
                Err(e) => tracing::warn!("Discarding candle: {}", e),
            }
        }

        if !closed.is_empty() {
            tracing::debug!(
                instrument = %self.instrument,
                closed = closed.len(),
                history = self.history.len(),
                "Closed candles"
            );
        }

        closed
    }

    pub fn history(&self) -> &CandleHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CandleHistory {
        &mut self.history
    }

    /// Number of ticks buffered in still-open minutes
    pub fn pending_ticks(&self) -> u32 {
        self.pending.values().map(|m| m.tick_count).sum()
    }
}

/// Coordinator owning one aggregation context per monitored instrument
///
/// `ingest` is the single-threaded entry point. The pipeline only uses the
/// instrument filter and `new_context`, and hands each context to its own
/// worker task.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    monitored: HashSet<String>,
    history_capacity: usize,
    instruments: HashMap<String, InstrumentAggregator>,
}

impl CandleAggregator {
    pub fn new<I, S>(monitored: I, history_capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            monitored: monitored.into_iter().map(Into::into).collect(),
            history_capacity,
            instruments: HashMap::new(),
        }
    }

    pub fn is_monitored(&self, instrument: &str) -> bool {
        self.monitored.contains(instrument)
    }

    /// Fresh aggregation context for a monitored instrument
    pub fn new_context(&self, instrument: &str) -> Option<InstrumentAggregator> {
        if !self.is_monitored(instrument) {
            tracing::trace!(instrument = %instrument, "Ignoring unmonitored instrument");
            return None;
        }
        Some(InstrumentAggregator::new(instrument, self.history_capacity))
    }

    /// Ingest a tick; ticks for unmonitored instruments are ignored
    pub fn ingest(&mut self, tick: Tick) -> Vec<Candle> {
        if !self.instruments.contains_key(&tick.instrument) {
            match self.new_context(&tick.instrument) {
                Some(context) => {
                    self.instruments.insert(tick.instrument.clone(), context);
                }
                None => return Vec::new(),
            }
        }

        match self.instruments.get_mut(&tick.instrument) {
            Some(context) => context.ingest(tick.event_time, tick.price),
            None => Vec::new(),
        }
    }

    pub fn history(&self, instrument: &str) -> Option<&CandleHistory> {
        self.instruments.get(instrument).map(|a| a.history())
    }

    /// Instruments observed so far
    pub fn instruments(&self) -> Vec<String> {
        self.instruments.keys().cloned().collect()
    }
}
