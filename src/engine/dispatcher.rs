use crate::error::SinkError;
use crate::sinks::{EventSink, SinkEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Delivery counters reported when the dispatcher stops
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub events: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Non-blocking handle used by the ingestion path to hand events to sinks
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<SinkEvent>,
}

impl DispatchHandle {
    /// Wrap an existing channel. The receiver side is the caller's concern.
    pub fn from_sender(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event; drops it with a warning when the queue is full or closed
    pub fn emit(&self, event: SinkEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    instrument = %event.instrument(),
                    "Sink queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    instrument = %event.instrument(),
                    "Sink dispatcher stopped, dropping event"
                );
                false
            }
        }
    }
}

/// Delivers events to an ordered list of sinks, isolating each failure
pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
    sink_timeout: Duration,
}

impl SinkDispatcher {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>, sink_timeout: Duration) -> Self {
        Self {
            sinks,
            sink_timeout,
        }
    }

    /// Spawn the dispatcher task. It drains the queue and exits once every
    /// handle has been dropped.
    pub fn spawn(self, queue: usize) -> (DispatchHandle, JoinHandle<DispatchStats>) {
        let (tx, mut rx) = mpsc::channel(queue.max(1));

        let task = tokio::spawn(async move {
            let mut stats = DispatchStats::default();
            while let Some(event) = rx.recv().await {
                let failures = self.dispatch(&event).await;
                stats.events += 1;
                stats.failed += failures as u64;
                stats.delivered += (self.sinks.len() - failures) as u64;
            }
            tracing::info!(
                events = stats.events,
                failed = stats.failed,
                "Sink dispatcher drained"
            );
            stats
        });

        (DispatchHandle { tx }, task)
    }

    /// Deliver one event to every sink in order; returns the number of failures
    pub async fn dispatch(&self, event: &SinkEvent) -> usize {
        let mut failures = 0;

        for sink in &self.sinks {
            let result = match timeout(self.sink_timeout, sink.handle(event)).await {
                Ok(r) => r,
                Err(_) => Err(SinkError::Timeout(sink.name())),
            };

            if let Err(e) = result {
                failures += 1;
                tracing::warn!(
                    sink = sink.name(),
                    instrument = %event.instrument(),
                    "Sink failed: {}",
                    e
                );
            }
        }

        failures
    }
}
