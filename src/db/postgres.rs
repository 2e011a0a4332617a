use crate::error::SinkError;
use crate::models::{Candle, SignalCandidate};
use crate::sinks::{EventSink, SinkEvent};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use uuid::Uuid;

/// A signal as persisted, with its storage metadata
#[derive(Debug, Clone, Serialize)]
pub struct StoredSignal {
    pub id: Uuid,
    pub instrument: String,
    pub direction: String,
    pub confluence_count: i16,
    pub probability: f64,
    pub entry_minute: DateTime<Utc>,
    pub expiration_minutes: i32,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Postgres storage for closed candles and emitted signals
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and run pending migrations
    ///
    /// # Arguments
    /// * `database_url` - Postgres connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres");

        Ok(Self { pool })
    }

    /// Upsert a closed candle keyed by instrument and minute
    pub async fn store_candle(&self, candle: &Candle) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO candles (instrument, minute, open, high, low, close, tick_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (instrument, minute) DO UPDATE SET
                open = EXCLUDED.open,
                high = EXCLUDED.high,
                low = EXCLUDED.low,
                close = EXCLUDED.close,
                tick_count = EXCLUDED.tick_count
            "#,
        )
        .bind(&candle.instrument)
        .bind(candle.minute)
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .bind(candle.tick_count as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a signal under a fresh id; returns that id
    pub async fn store_signal(&self, signal: &SignalCandidate) -> std::result::Result<Uuid, SinkError> {
        let id = Uuid::new_v4();
        let probability = Decimal::from_f64_retain(signal.probability)
            .map(|d| d.round_dp(2))
            .ok_or_else(|| SinkError::Rejected {
                sink: "postgres",
                reason: format!("probability {} is not representable", signal.probability),
            })?;

        sqlx::query(
            r#"
            INSERT INTO signals (
                id, instrument, direction, confluence_count, probability,
                entry_minute, expiration_minutes, details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&signal.instrument)
        .bind(signal.direction.as_str())
        .bind(signal.confluence_count as i16)
        .bind(probability)
        .bind(signal.entry_minute)
        .bind(signal.expiration_minutes as i32)
        .bind(Json(signal.details()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Saved {} signal {} for {} to Postgres",
            signal.direction,
            id,
            signal.instrument
        );

        Ok(id)
    }

    /// Load stored candles for an instrument, oldest first
    pub async fn load_candles(
        &self,
        instrument: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            r#"
            SELECT instrument, minute, open, high, low, close, tick_count
            FROM candles
            WHERE instrument = $1 AND ($2::TIMESTAMPTZ IS NULL OR minute >= $2)
            ORDER BY minute ASC
            "#,
        )
        .bind(instrument)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let tick_count: i32 = row.get("tick_count");
            candles.push(Candle {
                instrument: row.get("instrument"),
                minute: row.get("minute"),
                open: row.get("open"),
                high: row.get("high"),
                low: row.get("low"),
                close: row.get("close"),
                tick_count: tick_count.max(0) as u32,
            });
        }

        tracing::info!("Loaded {} candles for {} from Postgres", candles.len(), instrument);

        Ok(candles)
    }

    /// Highest-probability signals whose entry minute has not passed yet
    pub async fn current_signals(&self, top: i64) -> Result<Vec<StoredSignal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instrument, direction, confluence_count, probability,
                   entry_minute, expiration_minutes, details, created_at
            FROM signals
            WHERE entry_minute >= date_trunc('minute', NOW())
            ORDER BY probability DESC, created_at DESC
            LIMIT $1
            "#,
        )
        .bind(top)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    /// Most recent signals first
    pub async fn signal_history(&self, limit: i64) -> Result<Vec<StoredSignal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instrument, direction, confluence_count, probability,
                   entry_minute, expiration_minutes, details, created_at
            FROM signals
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    #[cfg(test)]
    pub async fn clear_instrument(&self, instrument: &str) -> Result<()> {
        sqlx::query("DELETE FROM candles WHERE instrument = $1")
            .bind(instrument)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM signals WHERE instrument = $1")
            .bind(instrument)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn signal_from_row(row: &sqlx::postgres::PgRow) -> Result<StoredSignal> {
    let probability: Decimal = row.get("probability");
    Ok(StoredSignal {
        id: row.get("id"),
        instrument: row.get("instrument"),
        direction: row.get("direction"),
        confluence_count: row.get("confluence_count"),
        probability: probability.to_string().parse()?,
        entry_minute: row.get("entry_minute"),
        expiration_minutes: row.get("expiration_minutes"),
        details: row.get("details"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl EventSink for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn handle(&self, event: &SinkEvent) -> std::result::Result<(), SinkError> {
        match event {
            SinkEvent::CandleClosed(candle) => self.store_candle(candle).await?,
            SinkEvent::Signal(signal) => {
                self.store_signal(signal).await?;
            }
        }
        Ok(())
    }
}
