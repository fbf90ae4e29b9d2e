//! # Publishing
//!
//! The router publishes through [`EventPublisher`]. [`InMemoryEventBus`] fans
//! events out to subscriptions; [`NullEventPublisher`] counts and drops them.

use crate::events::{EventFilter, RouterEvent};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sink for router notifications.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event`. Returns how many subscriptions received it.
    async fn publish(&self, event: RouterEvent) -> usize;

    /// Events published so far.
    fn events_published(&self) -> u64;
}

/// In-process broadcast bus.
///
/// A subscription more than `capacity` events behind loses the oldest ones.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<RouterEvent>,
    capacity: usize,
    published: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            published: AtomicU64::new(0),
        }
    }

    /// Receive the events `filter` accepts, from now on.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(
            topics = ?filter.topics,
            navigations = ?filter.navigation_ids,
            "Router event subscription opened"
        );
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: RouterEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();
        // Sending fails only when nobody subscribed.
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(?topic, delivered, "Router event published");
        delivered
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Publisher for routers nobody observes.
#[derive(Debug, Default)]
pub struct NullEventPublisher {
    published: AtomicU64,
}

#[async_trait]
impl EventPublisher for NullEventPublisher {
    async fn publish(&self, _event: RouterEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        0
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
