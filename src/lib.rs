// Core modules
pub mod aggregation;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod replay;
pub mod sinks;
pub mod strategy;

// Re-export commonly used types
pub use aggregation::{CandleAggregator, CandleHistory};
pub use crate::config::Settings;
pub use engine::{Pipeline, SignalEngine};
pub use models::*;
pub use strategy::{ConfluenceScorer, Strategy};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
