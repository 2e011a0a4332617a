use super::dispatcher::{DispatchStats, SinkDispatcher};
use super::signal_engine::SignalEngine;
use crate::aggregation::{CandleAggregator, InstrumentAggregator};
use crate::config::Settings;
use crate::feed::TickSource;
use crate::models::Tick;
use crate::sinks::EventSink;
use crate::strategy::{ConfluenceConfig, ConfluenceScorer};
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Counters returned when the pipeline stops
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub ticks_received: u64,
    pub ticks_ignored: u64,
    pub candles_closed: u64,
    pub signals_emitted: u64,
    pub instruments: usize,
    pub dispatch: DispatchStats,
}

#[derive(Debug, Default)]
struct WorkerStats {
    candles_closed: u64,
    signals_emitted: u64,
}

struct Worker {
    tx: mpsc::Sender<Tick>,
    handle: JoinHandle<WorkerStats>,
}

/// Live ingestion: routes ticks to one single-writer worker per instrument
pub struct Pipeline {
    settings: Settings,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            sinks: Vec::new(),
        }
    }

    /// Append a sink; sinks are invoked in the order they were added
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Run until the source ends or `shutdown` flips to `true`
    ///
    /// On exit the worker queues are closed, workers finish what they hold,
    /// and the sink queue is drained before the stats are returned.
    pub async fn run<T: TickSource>(
        self,
        mut source: T,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineStats> {
        let pipeline = &self.settings.pipeline;
        let registry = CandleAggregator::new(
            self.settings.engine.monitored_instruments.iter().cloned(),
            self.settings.engine.history_capacity,
        );
        let worker_queue = pipeline.worker_queue.max(1);

        let dispatcher = SinkDispatcher::new(
            self.sinks.clone(),
            Duration::from_secs(pipeline.sink_timeout_secs),
        );
        let (dispatch, dispatcher_task) = dispatcher.spawn(pipeline.sink_queue);

        let scorer = ConfluenceScorer::new(ConfluenceConfig::from_settings(&self.settings));
        let engine = Arc::new(SignalEngine::new(scorer, dispatch));

        tracing::info!(
            instruments = self.settings.engine.monitored_instruments.len(),
            sinks = ?self.sink_names(),
            "Pipeline started"
        );

        let stop = async move {
            let stopped = shutdown.wait_for(|stop| *stop).await.map(|_| ()).is_ok();
            if !stopped {
                // Sender gone without a stop request: run until the source ends
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(stop);

        let mut stats = PipelineStats::default();
        let mut workers: HashMap<String, Worker> = HashMap::new();

        loop {
            let tick = tokio::select! {
                biased;
                _ = &mut stop => {
                    tracing::info!("Shutdown requested, no longer reading ticks");
                    break;
                }
                tick = source.next_tick() => tick,
            };

            let tick = match tick {
                Some(t) => t,
                None => {
                    tracing::info!("Tick source exhausted");
                    break;
                }
            };

            stats.ticks_received += 1;

            if !workers.contains_key(&tick.instrument) {
                let Some(context) = registry.new_context(&tick.instrument) else {
                    stats.ticks_ignored += 1;
                    continue;
                };
                tracing::info!(instrument = %tick.instrument, "Spawning instrument worker");
                workers.insert(
                    tick.instrument.clone(),
                    spawn_worker(context, engine.clone(), worker_queue),
                );
            }
            let Some(worker) = workers.get(&tick.instrument) else {
                continue;
            };

            if worker.tx.send(tick).await.is_err() {
                tracing::error!("Instrument worker stopped unexpectedly");
            }
        }

        stats.instruments = workers.len();
        for (instrument, worker) in workers {
            drop(worker.tx);
            let worker_stats = worker.handle.await?;
            tracing::debug!(
                instrument = %instrument,
                candles = worker_stats.candles_closed,
                signals = worker_stats.signals_emitted,
                "Instrument worker finished"
            );
            stats.candles_closed += worker_stats.candles_closed;
            stats.signals_emitted += worker_stats.signals_emitted;
        }

        // Last dispatch handle goes with the engine
        drop(engine);
        stats.dispatch = dispatcher_task.await?;

        tracing::info!(
            ticks = stats.ticks_received,
            ignored = stats.ticks_ignored,
            candles = stats.candles_closed,
            signals = stats.signals_emitted,
            "Pipeline stopped"
        );

        Ok(stats)
    }
}

fn spawn_worker(
    mut aggregator: InstrumentAggregator,
    engine: Arc<SignalEngine>,
    queue: usize,
) -> Worker {
    let (tx, mut rx) = mpsc::channel::<Tick>(queue);

    let handle = tokio::spawn(async move {
        let mut stats = WorkerStats::default();

        while let Some(tick) = rx.recv().await {
            let closed = aggregator.ingest(tick.event_time, tick.price);
            if closed.is_empty() {
                continue;
            }

            let history = aggregator.history_mut().as_slice();
            for candle in &closed {
                stats.candles_closed += 1;
                engine.record_candle(candle);

                // Each closed candle is evaluated on the history ending at it
                let end = match history.iter().rposition(|c| c.minute == candle.minute) {
                    Some(i) => i + 1,
                    None => continue,
                };
                if engine
                    .on_candle_closed(&candle.instrument, &history[..end])
                    .is_some()
                {
                    stats.signals_emitted += 1;
                }
            }
        }

        stats
    });

    Worker { tx, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChannelSource;
    use chrono::{TimeZone, Utc};

    fn settings(instruments: &[&str]) -> Settings {
        let mut settings = Settings::default();
        settings.engine.monitored_instruments = instruments.iter().map(|s| s.to_string()).collect();
        settings
    }

    #[tokio::test]
    async fn test_counts_ignored_and_closed() {
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        tx.send(Tick::new("EURUSD", base, 1.1)).await.unwrap();
        tx.send(Tick::new("USDJPY", base, 150.0)).await.unwrap();
        tx.send(Tick::new("EURUSD", base + chrono::Duration::seconds(61), 1.2))
            .await
            .unwrap();
        drop(tx);

        let stats = Pipeline::new(settings(&["EURUSD"]))
            .run(ChannelSource::new(rx), stop_rx)
            .await
            .unwrap();

        assert_eq!(stats.ticks_received, 3);
        assert_eq!(stats.ticks_ignored, 1);
        assert_eq!(stats.candles_closed, 1);
        assert_eq!(stats.signals_emitted, 0);
        assert_eq!(stats.instruments, 1);
        // One candle event, no sinks configured
        assert_eq!(stats.dispatch.events, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_reading() {
        let (_tx, rx) = mpsc::channel::<Tick>(16);
        let (stop_tx, stop_rx) = watch::channel(false);

        let run = tokio::spawn(
            Pipeline::new(settings(&["EURUSD"])).run(ChannelSource::new(rx), stop_rx),
        );
        stop_tx.send(true).unwrap();

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.ticks_received, 0);
    }
}
