//! Topic-keyed fan-out bus backed by `tokio::sync::broadcast` channels.
//!
//! [`TopicBus`] is the publish/subscribe hub for [`Envelope`]s. It is
//! designed to be shared via `Arc<TopicBus>` across the presence
//! registry and all editing sessions.

use std::collections::HashMap;

use atelier_core::collaboration::TOPIC_CHANNEL_CAPACITY;
use atelier_core::messages::CollabMessage;
use atelier_core::types::{SessionId, Timestamp};
use tokio::sync::{broadcast, RwLock};

use crate::topic::Topic;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A message published on a topic, stamped with its publisher's source
/// tag so receivers can drop their own echoes.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Source tag of the publishing session. `None` for messages the
    /// registry publishes on behalf of no particular session.
    pub source_tag: Option<SessionId>,

    /// The wire message being carried.
    pub message: CollabMessage,

    /// When the envelope was published (UTC).
    pub timestamp: Timestamp,
}

impl Envelope {
    /// Create an untagged envelope.
    pub fn new(message: CollabMessage) -> Self {
        Self {
            source_tag: None,
            message,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Stamp the publishing session's source tag onto the envelope.
    pub fn with_source_tag(mut self, tag: SessionId) -> Self {
        self.source_tag = Some(tag);
        self
    }
}

// ---------------------------------------------------------------------------
// TopicBus
// ---------------------------------------------------------------------------

/// In-process, topic-keyed fan-out bus.
///
/// Each topic gets its own `broadcast` channel, created on first use and
/// kept for the process lifetime. Publishing is fire-and-forget: sends
/// never block, a topic with zero subscribers silently drops the
/// envelope, and a lagging subscriber loses the oldest buffered
/// envelopes rather than stalling the publisher. Delivery is FIFO per
/// topic from a single publisher; nothing is guaranteed across topics.
#[derive(Debug)]
pub struct TopicBus {
    capacity: usize,
    topics: RwLock<HashMap<Topic, broadcast::Sender<Envelope>>>,
}

impl TopicBus {
    /// Create a bus whose per-topic channels buffer `capacity` envelopes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic, creating its channel if this is the first
    /// subscriber.
    pub async fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<Envelope> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.subscribe();
        }

        let mut topics = self.topics.write().await;
        // Re-check under the write lock: another subscriber may have
        // created the channel between our two lock acquisitions.
        topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an envelope to all current subscribers of a topic.
    ///
    /// If the topic has never been subscribed to, or all subscribers are
    /// gone, the envelope is silently dropped.
    pub async fn publish(&self, topic: &Topic, envelope: Envelope) {
        let topics = self.topics.read().await;
        let Some(sender) = topics.get(topic) else {
            tracing::trace!(topic = %topic, "Publish on topic with no channel, dropped");
            return;
        };
        // Ignore the SendError — it only means there are zero receivers.
        let _ = sender.send(envelope);
    }

    /// Return the number of topics that currently have a channel.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(TOPIC_CHANNEL_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
