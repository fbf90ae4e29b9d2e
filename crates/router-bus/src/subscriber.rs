//! # Subscriptions
//!
//! Receiving side of the bus. Every subscription gets the full broadcast and
//! applies its own [`EventFilter`].

use crate::events::{EventFilter, RouterEvent};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::debug;

/// Filtered receiver of router events. Dropping it unsubscribes.
pub struct Subscription {
    receiver: Receiver<RouterEvent>,
    filter: EventFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: Receiver<RouterEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Next matching event, or `None` once the bus is gone.
    ///
    /// A subscription that fell behind by more than the bus capacity skips
    /// the events it missed.
    pub async fn recv(&mut self) -> Option<RouterEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Subscription lagged behind the router");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Matching events already buffered, in publish order.
    pub fn drain(&mut self) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        events.push(event);
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    debug!(missed, "Subscription lagged behind the router");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            }
        }
    }

    /// Matching events of one navigation, up to and including its
    /// `NavigationEnded`. Returns early when the bus goes away.
    ///
    /// The filter must let `NavigationEnded` through, otherwise this only
    /// returns once the bus is dropped.
    pub async fn until_ended(&mut self, navigation_id: u64) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            if event.navigation_id() != Some(navigation_id) {
                continue;
            }
            let ended = matches!(event, RouterEvent::NavigationEnded { .. });
            events.push(event);
            if ended {
                break;
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventTopic, NavigationOutcome};
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use std::time::Duration;
    use tokio::time::timeout;

    fn started(id: u64) -> RouterEvent {
        RouterEvent::NavigationStarted {
            navigation_id: id,
            instruction: "home".to_string(),
        }
    }

    fn ended(id: u64) -> RouterEvent {
        RouterEvent::NavigationEnded {
            navigation_id: id,
            outcome: NavigationOutcome::Committed,
            path: "home".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recv_skips_filtered_events() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::navigation(2));

        bus.publish(started(1)).await;
        bus.publish(started(2)).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received.navigation_id(), Some(2));
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = InMemoryEventBus::new();
        {
            let _first = bus.subscribe(EventFilter::all());
            let _second = bus.subscribe(EventFilter::topics(vec![EventTopic::Endpoint]));
            assert_eq!(bus.subscriber_count(), 2);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_keeps_publish_order() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Navigation]));

        bus.publish(started(1)).await;
        bus.publish(RouterEvent::EndpointConnected {
            endpoint_id: 4,
            name: "main".to_string(),
        })
        .await;
        bus.publish(started(2)).await;

        let ids: Vec<_> = sub.drain().iter().filter_map(RouterEvent::navigation_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(sub.drain().is_empty());
    }

    #[tokio::test]
    async fn test_drain_survives_lag() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());
        for id in 1..=5 {
            bus.publish(started(id)).await;
        }

        let ids: Vec<_> = sub.drain().iter().filter_map(RouterEvent::navigation_id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_until_ended_collects_one_navigation() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(started(1)).await;
        bus.publish(started(2)).await;
        bus.publish(ended(2)).await;
        bus.publish(ended(1)).await;

        let events = timeout(Duration::from_millis(100), sub.until_ended(1))
            .await
            .expect("timeout");
        assert_eq!(events, vec![started(1), ended(1)]);
    }
}
