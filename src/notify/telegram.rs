use super::NotificationChannel;
use crate::error::SinkError;
use crate::models::SignalCandidate;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;

type TelegramRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram bot notifications, one message per signal
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
    rate_limiter: Arc<TelegramRateLimiter>,
}

impl TelegramChannel {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        // Telegram allows roughly one message per second to the same chat
        let quota = Quota::per_second(NonZeroU32::MIN);

        Self {
            client,
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token,
            chat_id,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Markdown message body for a signal
    pub fn build_message(signal: &SignalCandidate) -> String {
        let mut text = format!(
            "*{} signal* {}\n\
             Entry: {} UTC\n\
             Confluences: {}/7\n\
             Probability: {:.2}%\n\
             Expiration: {} min\n",
            signal.direction,
            escape_markdown(&signal.instrument),
            signal.entry_minute.format("%Y-%m-%d %H:%M"),
            signal.confluence_count,
            signal.probability,
            signal.expiration_minutes,
        );

        for (name, met) in signal.details() {
            let mark = if met.as_bool().unwrap_or(false) { "✅" } else { "❌" };
            text.push_str(&format!("{} {}\n", mark, escape_markdown(&name)));
        }

        text
    }
}

fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, signal: &SignalCandidate) -> Result<(), SinkError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": Self::build_message(signal),
            "parse_mode": "Markdown",
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let parsed: SendMessageResponse = response.json().await?;

        if !status.is_success() || !parsed.ok {
            return Err(SinkError::Rejected {
                sink: "telegram",
                reason: parsed
                    .description
                    .unwrap_or_else(|| format!("status {}", status)),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionSet, Direction};
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn signal() -> SignalCandidate {
        SignalCandidate {
            instrument: "EURUSD".to_string(),
            direction: Direction::Call,
            confluence_count: 5,
            probability: 82.5,
            conditions: ConditionSet {
                ema_trend: true,
                price_vs_emas: true,
                rsi_zone: true,
                volume: true,
                support_resistance: true,
                ..Default::default()
            },
            entry_minute: Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap(),
            expiration_minutes: 2,
        }
    }

    #[test]
    fn test_build_message() {
        let text = TelegramChannel::build_message(&signal());

        assert!(text.starts_with("*CALL signal* EURUSD\n"));
        assert!(text.contains("Entry: 2024-01-01 10:05 UTC"));
        assert!(text.contains("Confluences: 5/7"));
        assert!(text.contains("Probability: 82.50%"));
        assert!(text.contains("Expiration: 2 min"));
        assert!(text.contains("✅ price\\_above\\_emas"));
        assert!(text.contains("❌ bollinger\\_touch"));
    }

    #[tokio::test]
    async fn test_send_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "42",
                "parse_mode": "Markdown"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create_async()
            .await;

        let channel =
            TelegramChannel::new("TOKEN".to_string(), "42".to_string()).with_base_url(server.url());
        channel.send(&signal()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let channel =
            TelegramChannel::new("TOKEN".to_string(), "42".to_string()).with_base_url(server.url());
        let err = channel.send(&signal()).await.unwrap_err();

        assert!(err.to_string().contains("chat not found"));
    }
}
