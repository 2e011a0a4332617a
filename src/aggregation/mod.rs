// Tick-to-candle aggregation
pub mod aggregator;
pub mod candle_history;

pub use aggregator::{CandleAggregator, InstrumentAggregator};
pub use candle_history::CandleHistory;
