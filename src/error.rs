use chrono::{DateTime, Utc};
use thiserror::Error;

/// Configuration problems detected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Failure of a single downstream sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{sink} rejected event: {reason}")]
    Rejected { sink: &'static str, reason: String },
    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Candle history invariants
#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("candle for {instrument} at {minute} is not after last candle at {last}")]
    OutOfOrder {
        instrument: String,
        minute: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}
