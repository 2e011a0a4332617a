use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use signalbot::db::PostgresStore;
use signalbot::engine::Pipeline;
use signalbot::feed::JsonLinesSource;
use signalbot::notify::Notifier;
use signalbot::persistence::RedisPublisher;
use signalbot::replay::{
    load_candles_jsonl, CalibrationReport, MarketScenario, ReplayDriver, SyntheticCandleGenerator,
};
use signalbot::sinks::BroadcastSink;
use signalbot::strategy::{ConfluenceConfig, ConfluenceScorer};
use signalbot::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "signalbot", about = "Minute-candle confluence signal engine")]
struct Cli {
    /// Configuration file (defaults to ./signalbot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate live ticks and emit signals
    Run {
        /// JSON-lines tick file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Replay historical candles through the live evaluation path
    Replay {
        #[arg(long)]
        instrument: String,
        /// JSON-lines candle file
        #[arg(long, conflicts_with = "synthetic")]
        candles: Option<PathBuf>,
        /// Generate this many synthetic candles instead of loading any
        #[arg(long)]
        synthetic: Option<usize>,
        #[arg(long, default_value = "sideways")]
        scenario: MarketScenario,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Write the calibration report here as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Query stored signals
    Signals {
        #[command(subcommand)]
        query: SignalQuery,
    },
}

#[derive(Subcommand)]
enum SignalQuery {
    /// Highest-probability upcoming signals
    Current {
        #[arg(long, default_value_t = 10)]
        top: i64,
    },
    /// Most recent signals
    History {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run { input } => run_live(settings, input).await,
        Command::Replay {
            instrument,
            candles,
            synthetic,
            scenario,
            seed,
            report,
        } => {
            let source = match (candles, synthetic) {
                (Some(path), _) => CandleInput::File(path),
                (None, Some(n)) => CandleInput::Synthetic { n, scenario, seed },
                (None, None) => CandleInput::Postgres,
            };
            run_replay(settings, &instrument, source, report).await
        }
        Command::Signals { query } => run_query(settings, query).await,
    }
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("signalbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect_to_postgres(settings: &Settings) -> Option<PostgresStore> {
    let database_url = settings.storage.database_url.as_deref()?;

    match PostgresStore::new(database_url).await {
        Ok(store) => {
            tracing::info!("Postgres persistence enabled (candles & signals)");
            Some(store)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Postgres ({}), continuing without persistence",
                e
            );
            None
        }
    }
}

async fn connect_to_redis(settings: &Settings) -> Option<RedisPublisher> {
    let redis_url = settings.storage.redis_url.as_deref()?;

    match RedisPublisher::new(redis_url).await {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Redis ({}), continuing without live publishing",
                e
            );
            None
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_live(settings: Settings, input: Option<PathBuf>) -> Result<()> {
    tracing::info!(
        instruments = ?settings.engine.monitored_instruments,
        "signalbot starting"
    );

    let mut pipeline = Pipeline::new(settings.clone());

    if let Some(store) = connect_to_postgres(&settings).await {
        pipeline = pipeline.with_sink(Arc::new(store));
    }
    if let Some(publisher) = connect_to_redis(&settings).await {
        pipeline = pipeline.with_sink(Arc::new(publisher));
    }
    if let Some(notifier) = Notifier::from_settings(&settings.notify) {
        pipeline = pipeline.with_sink(Arc::new(notifier));
    }

    let broadcast = BroadcastSink::new(256);
    let mut live = broadcast.subscribe();
    pipeline = pipeline.with_sink(Arc::new(broadcast));

    // Print every signal to stdout as one JSON line
    let printer = tokio::spawn(async move {
        loop {
            match live.recv().await {
                Ok(signal) => match serde_json::to_string(&signal) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to serialize signal: {}", e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Signal printer lagged, skipped {} signals", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down...");
            let _ = stop_tx.send(true);
        }
    });

    let stats = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            pipeline
                .run(JsonLinesSource::new(BufReader::new(file)), stop_rx)
                .await
        }
        None => {
            pipeline
                .run(JsonLinesSource::new(BufReader::new(tokio::io::stdin())), stop_rx)
                .await
        }
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    printer.await.context("Signal printer panicked")?;

    tracing::info!("{}", serde_json::to_string(&stats)?);
    tracing::info!("signalbot stopped");
    Ok(())
}

enum CandleInput {
    File(PathBuf),
    Synthetic {
        n: usize,
        scenario: MarketScenario,
        seed: u64,
    },
    Postgres,
}

async fn run_replay(
    settings: Settings,
    instrument: &str,
    source: CandleInput,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let candles = match source {
        CandleInput::File(path) => load_candles_jsonl(&path)
            .await
            .map_err(|e| anyhow::anyhow!(e))?,
        CandleInput::Synthetic { n, scenario, seed } => {
            let start = Utc::now() - chrono::Duration::minutes(n as i64);
            SyntheticCandleGenerator::new(seed).generate(instrument, scenario, n, start)
        }
        CandleInput::Postgres => {
            let Some(store) = connect_to_postgres(&settings).await else {
                bail!("replay needs --candles, --synthetic or a reachable database");
            };
            store
                .load_candles(instrument, None)
                .await
                .map_err(|e| anyhow::anyhow!(e))?
        }
    };

    let scorer = ConfluenceScorer::new(ConfluenceConfig::from_settings(&settings));
    let driver = ReplayDriver::new(scorer, settings.engine.history_capacity);
    let labeled = driver.replay_labeled(instrument, candles);

    for signal in &labeled {
        println!("{}", serde_json::to_string(signal)?);
    }

    let report = CalibrationReport::from_signals(&labeled);
    tracing::info!(
        signals = report.total_signals,
        labeled = report.labeled_signals,
        win_rate = report.overall.win_rate,
        "Replay complete"
    );

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Calibration saved to {}", path.display());
    }

    Ok(())
}

async fn run_query(settings: Settings, query: SignalQuery) -> Result<()> {
    let Some(store) = connect_to_postgres(&settings).await else {
        bail!("signal queries need storage.database_url");
    };

    let signals = match query {
        SignalQuery::Current { top } => store.current_signals(top).await,
        SignalQuery::History { limit } => store.signal_history(limit).await,
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", serde_json::to_string_pretty(&signals)?);
    Ok(())
}
