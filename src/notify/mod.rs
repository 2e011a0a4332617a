// Outbound notifications for high-probability signals
pub mod telegram;
pub mod webhook;

pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;

use crate::config::NotifySettings;
use crate::error::SinkError;
use crate::models::SignalCandidate;
use crate::sinks::{EventSink, SinkEvent};
use async_trait::async_trait;

/// A single notification target
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, signal: &SignalCandidate) -> Result<(), SinkError>;
}

/// Sends signals at or above a probability threshold to every channel
///
/// Channels succeed or fail independently; one failing channel never
/// prevents delivery to the others.
pub struct Notifier {
    threshold: f64,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Build from settings; `None` when no channel is configured
    pub fn from_settings(settings: &NotifySettings) -> Option<Self> {
        let mut notifier = Self::new(settings.probability_threshold);

        if let Some(url) = &settings.webhook_url {
            notifier = notifier.with_channel(Box::new(WebhookChannel::new(url.clone())));
        }

        if let (Some(token), Some(chat_id)) =
            (&settings.telegram_bot_token, &settings.telegram_chat_id)
        {
            notifier = notifier.with_channel(Box::new(TelegramChannel::new(
                token.clone(),
                chat_id.clone(),
            )));
        }

        if notifier.channels.is_empty() {
            None
        } else {
            Some(notifier)
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn should_notify(&self, signal: &SignalCandidate) -> bool {
        signal.probability >= self.threshold
    }

    /// Deliver to all channels; returns the names of the channels that failed
    pub async fn notify(&self, signal: &SignalCandidate) -> Vec<&'static str> {
        let mut failed = Vec::new();

        for channel in &self.channels {
            match channel.send(signal).await {
                Ok(()) => tracing::info!(
                    channel = channel.name(),
                    instrument = %signal.instrument,
                    probability = signal.probability,
                    "Notification sent"
                ),
                Err(e) => {
                    tracing::warn!(
                        channel = channel.name(),
                        instrument = %signal.instrument,
                        "Notification failed: {}",
                        e
                    );
                    failed.push(channel.name());
                }
            }
        }

        failed
    }
}

#[async_trait]
impl EventSink for Notifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    async fn handle(&self, event: &SinkEvent) -> Result<(), SinkError> {
        let signal = match event {
            SinkEvent::Signal(s) if self.should_notify(s) => s,
            _ => return Ok(()),
        };

        let failed = self.notify(signal).await;
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                sink: "notifier",
                reason: format!("channels failed: {}", failed.join(", ")),
            })
        }
    }
}
