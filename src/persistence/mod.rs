use crate::error::SinkError;
use crate::models::SignalCandidate;
use crate::sinks::{signal_payload, EventSink, SinkEvent};
use crate::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

/// Pub/sub channel carrying every live signal
pub const LIVE_CHANNEL: &str = "signals:live";

/// Entries kept per instrument in the recent-signals list
pub const RECENT_LIMIT: isize = 100;

/// Redis publisher for live signal subscribers
///
/// Publishes each signal on [`LIVE_CHANNEL`] and keeps a capped list
/// `signals:recent:{instrument}` for late joiners.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    pub fn recent_key(instrument: &str) -> String {
        format!("signals:recent:{}", instrument)
    }

    /// Publish a signal and push it onto the instrument's recent list
    pub async fn publish(&self, signal: &SignalCandidate) -> std::result::Result<(), SinkError> {
        let value = serde_json::to_string(&signal_payload(signal))?;
        let key = Self::recent_key(&signal.instrument);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .publish(LIVE_CHANNEL, &value)
            .ignore()
            .lpush(&key, &value)
            .ignore()
            .ltrim(&key, 0, RECENT_LIMIT - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!("Published {} signal for {} to Redis", signal.direction, signal.instrument);

        Ok(())
    }

    /// Recent signals of an instrument, newest first
    pub async fn recent(&self, instrument: &str, count: isize) -> Result<Vec<serde_json::Value>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .lrange(Self::recent_key(instrument), 0, count.max(1) - 1)
            .await?;

        let mut signals = Vec::with_capacity(raw.len());
        for json_str in raw {
            signals.push(serde_json::from_str(&json_str)?);
        }
        Ok(signals)
    }
}

#[async_trait]
impl EventSink for RedisPublisher {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn handle(&self, event: &SinkEvent) -> std::result::Result<(), SinkError> {
        match event {
            SinkEvent::Signal(signal) => self.publish(signal).await,
            SinkEvent::CandleClosed(_) => Ok(()),
        }
    }
}
