// Downstream sinks for closed candles and signals
use crate::error::SinkError;
use crate::models::{Candle, SignalCandidate};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Event handed from the ingestion path to the sinks
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    CandleClosed(Candle),
    Signal(SignalCandidate),
}

impl SinkEvent {
    pub fn instrument(&self) -> &str {
        match self {
            SinkEvent::CandleClosed(c) => &c.instrument,
            SinkEvent::Signal(s) => &s.instrument,
        }
    }
}

/// Wire form of a signal shared by the publishing sinks
pub fn signal_payload(signal: &SignalCandidate) -> serde_json::Value {
    serde_json::json!({
        "instrument": signal.instrument,
        "type": signal.direction,
        "confluences": signal.confluence_count,
        "probability": signal.probability,
        "entry_minute": signal.entry_minute,
        "expiration_minutes": signal.expiration_minutes,
        "details": signal.details(),
    })
}

/// A best-effort consumer of pipeline events
///
/// Failures are reported per call and never reach the ingestion path.
/// Sinks ignore event kinds they do not care about by returning `Ok(())`.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &SinkEvent) -> Result<(), SinkError>;
}

/// In-process live subscribers
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SignalCandidate>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalCandidate> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn handle(&self, event: &SinkEvent) -> Result<(), SinkError> {
        if let SinkEvent::Signal(signal) = event {
            // No subscribers is not a failure
            let _ = self.tx.send(signal.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionSet, Direction};
    use chrono::Utc;

    fn signal() -> SignalCandidate {
        SignalCandidate {
            instrument: "EURUSD".to_string(),
            direction: Direction::Call,
            confluence_count: 4,
            probability: 72.5,
            conditions: ConditionSet::default(),
            entry_minute: Utc::now(),
            expiration_minutes: 2,
        }
    }

    #[tokio::test]
    async fn test_broadcast_delivers_signals() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.handle(&SinkEvent::Signal(signal())).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.instrument, "EURUSD");
    }

    #[test]
    fn test_signal_payload_fields() {
        let mut s = signal();
        s.conditions.ema_trend = true;
        let payload = signal_payload(&s);

        assert_eq!(payload["type"], "CALL");
        assert_eq!(payload["confluences"], 4);
        assert_eq!(payload["details"]["ema"], true);
        assert_eq!(payload["details"]["price_above_emas"], false);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let sink = BroadcastSink::new(8);
        assert!(sink.handle(&SinkEvent::Signal(signal())).await.is_ok());
    }
}
