// Signal engine, sink dispatch and the live pipeline
pub mod dispatcher;
pub mod pipeline;
pub mod signal_engine;

pub use dispatcher::{DispatchHandle, DispatchStats, SinkDispatcher};
pub use pipeline::{Pipeline, PipelineStats};
pub use signal_engine::SignalEngine;
