//! Asynchronous message channel abstraction and an in-process implementation.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a message channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel refused the message.
    #[error("Channel '{channel}' unavailable: {reason}")]
    Unavailable { channel: String, reason: String },

    /// The payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stream of messages delivered on one channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = Value> + Send>>;

/// Publish/subscribe transport between the saga and the external services.
///
/// Delivery is at-least-once with no ordering guarantee across channels;
/// consumers must tolerate duplicates.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publishes a JSON payload on the named channel.
    async fn publish(&self, channel: &str, payload: Value) -> Result<(), ChannelError>;

    /// Subscribes to the named channel. Only messages published after the
    /// call are delivered.
    fn subscribe(&self, channel: &str) -> MessageStream;
}

/// Extension methods for typed messages.
#[async_trait]
pub trait MessageChannelExt: MessageChannel {
    /// Serializes and publishes a message.
    async fn publish_message<T>(&self, channel: &str, message: &T) -> Result<(), ChannelError>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_value(message)?;
        self.publish(channel, payload).await
    }
}

impl<T: MessageChannel + ?Sized> MessageChannelExt for T {}

#[derive(Default)]
struct ChannelState {
    published: HashMap<String, Vec<Value>>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    fail_on_publish: bool,
}

/// In-process channel for tests and single-process deployments.
///
/// Keeps a log of everything published so tests can inspect outbound
/// requests, and fans each message out to every live subscriber.
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryChannel {
    /// Creates a new empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the channel to reject publishes.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state().fail_on_publish = fail;
    }

    /// Returns every payload published on a channel, oldest first.
    pub fn published(&self, channel: &str) -> Vec<Value> {
        self.state()
            .published
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of payloads published on a channel.
    pub fn published_count(&self, channel: &str) -> usize {
        self.state().published.get(channel).map_or(0, Vec::len)
    }

    /// Decodes every payload published on a channel, skipping malformed ones.
    pub fn published_as<T: DeserializeOwned>(&self, channel: &str) -> Vec<T> {
        self.published(channel)
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, channel: &str, payload: Value) -> Result<(), ChannelError> {
        let mut state = self.state();

        if state.fail_on_publish {
            return Err(ChannelError::Unavailable {
                channel: channel.to_string(),
                reason: "publish rejected".to_string(),
            });
        }

        if let Some(subscribers) = state.subscribers.get_mut(channel) {
            subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        }
        state
            .published
            .entry(channel.to_string())
            .or_default()
            .push(payload);

        tracing::debug!(channel, "message published");
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> MessageStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state()
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        }))
    }
}
