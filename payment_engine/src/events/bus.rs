use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use log::*;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::envelope::Envelope;

#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("The event bus is unavailable: {0}")]
    Unavailable(String),
    #[error("Could not serialize event: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Serialization(e.to_string())
    }
}

/// A stream of envelopes for one topic. Ends when the bus drops the sending side.
pub struct Subscription {
    topic: String,
    receiver: mpsc::Receiver<Envelope>,
}

impl Subscription {
    pub fn new(topic: &str, receiver: mpsc::Receiver<Envelope>) -> Self {
        Self { topic: topic.to_string(), receiver }
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub async fn next(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}

/// The message broker seam. Delivery is at-least-once and unordered from the consumer's point of view.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, exchange: &str, topic: &str, envelope: Envelope) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub exchange: String,
    pub topic: String,
    pub envelope: Envelope,
}

const HISTORY_LIMIT: usize = 1024;

/// An in-process [`EventBus`]. Each publish is delivered to every live subscriber of the topic. Subscribers that have
/// gone away are pruned on the next publish.
pub struct MemoryBus {
    buffer_size: usize,
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Envelope>>>>,
    history: Mutex<Vec<PublishedEvent>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MemoryBus {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size: buffer_size.max(1), subscribers: Mutex::default(), history: Mutex::default() }
    }

    /// The most recent publishes, oldest first.
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedEvent> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().filter(|e| e.topic == topic).cloned().collect()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).get(topic).map(Vec::len).unwrap_or(0)
    }

    fn record(&self, event: PublishedEvent) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() >= HISTORY_LIMIT {
            history.remove(0);
        }
        history.push(event);
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, exchange: &str, topic: &str, envelope: Envelope) -> Result<(), BusError> {
        self.record(PublishedEvent {
            exchange: exchange.to_string(),
            topic: topic.to_string(),
            envelope: envelope.clone(),
        });
        // Never hold the lock across a send
        let senders = {
            let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            subscribers.get(topic).cloned().unwrap_or_default()
        };
        let mut closed = 0;
        for sender in &senders {
            if sender.send(envelope.clone()).await.is_err() {
                closed += 1;
            }
        }
        if closed > 0 {
            debug!("📬️ Pruning {closed} closed subscriber(s) from {topic}");
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = subscribers.get_mut(topic) {
                list.retain(|s| !s.is_closed());
            }
        }
        trace!("📬️ Published {topic} to {exchange} ({} subscribers)", senders.len() - closed);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.entry(topic.to_string()).or_default().push(sender);
        debug!("📬️ New subscriber for {topic}");
        Ok(Subscription::new(topic, receiver))
    }
}
