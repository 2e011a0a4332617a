// Upstream tick sources
pub mod payload;
pub mod source;

pub use payload::{parse_price_update, PRICE_UPDATE_EVENT};
pub use source::{ChannelSource, JsonLinesSource, TickSource};
