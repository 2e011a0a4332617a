use super::payload::parse_price_update;
use crate::models::Tick;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

/// Upstream tick stream
///
/// `None` means the stream has ended.
#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> Option<Tick>;
}

/// Reads newline-delimited JSON price updates
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            skipped: 0,
        }
    }

    /// Lines that did not yield a tick
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TickSource for JsonLinesSource<R> {
    async fn next_tick(&mut self) -> Option<Tick> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!("Tick stream read failed: {}", e);
                    return None;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) => {
                    if let Some(tick) = parse_price_update(&value) {
                        return Some(tick);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed payload: {}", e),
            }
            self.skipped += 1;
        }
    }
}

/// Adapts an in-process channel of ticks
pub struct ChannelSource {
    rx: mpsc::Receiver<Tick>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Tick>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl TickSource for ChannelSource {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_json_lines_skips_garbage() {
        let input = concat!(
            "{\"symbol\":\"EURUSD\",\"price\":1.1,\"ts\":1704103205000}\n",
            "\n",
            "not json\n",
            "[\"message\",{\"event\":\"heartbeat\"}]\n",
            "{\"symbol\":\"EURUSD\",\"price\":1.2,\"ts\":1704103210000}\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        assert_eq!(source.next_tick().await.unwrap().price, 1.1);
        assert_eq!(source.next_tick().await.unwrap().price, 1.2);
        assert!(source.next_tick().await.is_none());
        assert_eq!(source.skipped(), 2);
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new(rx);

        tx.send(Tick::new("EURUSD", chrono::Utc::now(), 1.1))
            .await
            .unwrap();
        drop(tx);

        assert!(source.next_tick().await.is_some());
        assert!(source.next_tick().await.is_none());
    }
}
