use super::NotificationChannel;
use crate::error::SinkError;
use crate::models::SignalCandidate;
use crate::sinks::signal_payload;
use async_trait::async_trait;
use reqwest::Client;
use tokio::time::{sleep, Duration};

const REQUEST_TIMEOUT_SECS: u64 = 5;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// POSTs signal JSON to an HTTP endpoint
pub struct WebhookChannel {
    client: Client,
    url: String,
    initial_backoff: Duration,
}

impl WebhookChannel {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Worst case for one delivery with the default timeout and backoff.
    /// The per-sink timeout has to be longer or the last attempt is cut off.
    pub const fn retry_budget() -> Duration {
        let backoff_ms = INITIAL_BACKOFF_MS * ((1 << (MAX_RETRIES - 1)) - 1);
        Duration::from_millis(REQUEST_TIMEOUT_SECS * 1000 * MAX_RETRIES as u64 + backoff_ms)
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Single attempt; `Ok(false)` means a retryable response
    async fn post_once(&self, body: &serde_json::Value) -> Result<bool, SinkError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(true);
        }

        if status.is_server_error() || status.as_u16() == 429 {
            tracing::warn!("Webhook returned {}", status);
            return Ok(false);
        }

        Err(SinkError::Rejected {
            sink: "webhook",
            reason: format!("status {}", status),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    /// Retries transport errors and 5xx/429 responses with exponential backoff
    async fn send(&self, signal: &SignalCandidate) -> Result<(), SinkError> {
        let body = signal_payload(signal);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.post_once(&body).await {
                Ok(true) => {
                    if attempt > 1 {
                        tracing::info!("Webhook delivered after {} attempts", attempt);
                    }
                    return Ok(());
                }
                Ok(false) => {}
                // Client errors will not improve on retry
                Err(e @ SinkError::Rejected { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!("Webhook attempt {}/{} failed: {}", attempt, MAX_RETRIES, e);
                    last_error = Some(e);
                }
            }

            if attempt < MAX_RETRIES {
                sleep(self.initial_backoff * 2_u32.pow(attempt - 1)).await;
            }
        }

        Err(last_error.unwrap_or(SinkError::Rejected {
            sink: "webhook",
            reason: format!("gave up after {} attempts", MAX_RETRIES),
        }))
    }
}
