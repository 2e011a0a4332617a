pub mod driver;
pub mod report;
pub mod synthetic;

pub use driver::{LabeledSignal, ReplayDriver};
pub use report::{probability_bucket, BucketStats, CalibrationReport};
pub use synthetic::{MarketScenario, SyntheticCandleGenerator};

use crate::models::Candle;
use crate::Result;
use std::path::Path;

/// Load candles from a JSON-lines file, one serialized candle per line
pub async fn load_candles_jsonl(path: &Path) -> Result<Vec<Candle>> {
    let content = tokio::fs::read_to_string(path).await?;

    let mut candles = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Candle>(line) {
            Ok(c) => candles.push(c),
            Err(e) => tracing::warn!("Skipping line {} of {}: {}", n + 1, path.display(), e),
        }
    }

    tracing::info!("Loaded {} candles from {}", candles.len(), path.display());

    Ok(candles)
}
