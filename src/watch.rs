//! Live view of new messages in a single channel.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serenity::all::Message;
use std::future::Future;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Room for bursts between prints; older messages are dropped and reported as lag
pub const WATCH_BUFFER: usize = 256;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WatchedMessage {
    pub channel_id: u64,
    pub author_id: u64,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for WatchedMessage {
    fn from(message: &Message) -> Self {
        Self {
            channel_id: message.channel_id.get(),
            author_id: message.author.id.get(),
            author: message.author.tag(),
            content: message.content.clone(),
            timestamp: message.timestamp.to_utc(),
        }
    }
}

/// Subscription to one channel's new messages.
///
/// Holding the watch keeps the broadcast receiver registered; dropping it unsubscribes.
pub struct ChannelWatch {
    channel_id: u64,
    self_id: u64,
    stream: BroadcastStream<WatchedMessage>,
}

impl ChannelWatch {
    pub fn new(channel_id: u64, self_id: u64, receiver: broadcast::Receiver<WatchedMessage>) -> Self {
        debug!("Watching channel {}", channel_id);
        Self {
            channel_id,
            self_id,
            stream: BroadcastStream::new(receiver),
        }
    }

    /// Next message for this channel not written by the bot itself.
    /// `None` once the session stops delivering events.
    pub async fn next(&mut self) -> Option<WatchedMessage> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(message) if message.channel_id == self.channel_id && message.author_id != self.self_id => {
                    return Some(message);
                }
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Live watch fell behind, skipped {} message(s)", skipped);
                }
            }
        }

        None
    }

    /// Deliver messages to `emit` until `cancel` resolves or the event stream ends.
    /// Consumes the watch so the subscription is released on every exit path.
    pub async fn run_until<F>(mut self, cancel: F, mut emit: impl FnMut(&WatchedMessage)) -> usize
    where
        F: Future,
    {
        tokio::pin!(cancel);
        let mut delivered = 0;

        loop {
            tokio::select! {
                _ = &mut cancel => break,
                next = self.next() => match next {
                    Some(message) => {
                        emit(&message);
                        delivered += 1;
                    }
                    None => break,
                },
            }
        }

        delivered
    }
}

impl Drop for ChannelWatch {
    fn drop(&mut self) {
        debug!("Released watch on channel {}", self.channel_id);
    }
}
