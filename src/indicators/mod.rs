// Technical indicators module
// Pure functions over price and candle series: EMA, RSI, Bollinger Bands,
// candlestick patterns, support/resistance

pub mod bollinger;
pub mod moving_average;
pub mod patterns;
pub mod rsi;
pub mod support_resistance;

pub use bollinger::{calculate_bollinger_bands, latest_bollinger_bands, BollingerBands};
pub use moving_average::{calculate_ema, calculate_sma};
pub use patterns::{bollinger_touch, is_hammer, is_shooting_star, BandTouch, DEFAULT_BAND_PROXIMITY};
pub use rsi::{calculate_rsi, RSI_EPSILON};
pub use support_resistance::{calculate_support_resistance, is_near_level, DEFAULT_SR_LOOKBACK};
