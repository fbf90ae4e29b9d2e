//! # Router Events
//!
//! Every notification the navigation engine publishes.

use serde::{Deserialize, Serialize};

/// How a navigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationOutcome {
    /// All endpoints committed their new content.
    Committed,
    /// A guard, interceptor or explicit cancel stopped the navigation.
    Cancelled,
    /// A hook, resolver or the engine itself failed.
    Failed,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterEvent {
    // =========================================================================
    // NAVIGATION LIFECYCLE
    // =========================================================================
    /// A navigation was admitted and is about to be processed.
    NavigationStarted {
        /// Navigation sequence number.
        navigation_id: u64,
        /// Textual form of the requested instructions.
        instruction: String,
    },

    /// A navigation failed. Always followed by `NavigationEnded`.
    NavigationFailed {
        /// Navigation sequence number.
        navigation_id: u64,
        /// Display form of the error.
        error: String,
    },

    /// A navigation was cancelled (guard rejection, veto or explicit cancel).
    NavigationCancelled {
        /// Navigation sequence number.
        navigation_id: u64,
        /// Why the navigation stopped.
        reason: String,
    },

    /// Last notification of every navigation.
    NavigationEnded {
        /// Navigation sequence number.
        navigation_id: u64,
        /// Final outcome.
        outcome: NavigationOutcome,
        /// Path of the committed state (empty unless committed).
        path: String,
    },

    // =========================================================================
    // ENDPOINTS
    // =========================================================================
    /// An endpoint was connected to the routing scope tree.
    EndpointConnected {
        /// Endpoint id.
        endpoint_id: u64,
        /// Endpoint name.
        name: String,
    },

    /// An endpoint (and its subtree) was disconnected.
    EndpointDisconnected {
        /// Endpoint id.
        endpoint_id: u64,
        /// Endpoint name.
        name: String,
    },
}

impl RouterEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::NavigationStarted { .. }
            | Self::NavigationFailed { .. }
            | Self::NavigationCancelled { .. }
            | Self::NavigationEnded { .. } => EventTopic::Navigation,
            Self::EndpointConnected { .. } | Self::EndpointDisconnected { .. } => {
                EventTopic::Endpoint
            }
        }
    }

    /// Navigation the event belongs to, if any.
    #[must_use]
    pub fn navigation_id(&self) -> Option<u64> {
        match self {
            Self::NavigationStarted { navigation_id, .. }
            | Self::NavigationFailed { navigation_id, .. }
            | Self::NavigationCancelled { navigation_id, .. }
            | Self::NavigationEnded { navigation_id, .. } => Some(*navigation_id),
            Self::EndpointConnected { .. } | Self::EndpointDisconnected { .. } => None,
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Navigation lifecycle events.
    Navigation,
    /// Endpoint registration events.
    Endpoint,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Navigations to include. Empty means all navigations.
    pub navigation_ids: Vec<u64>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            navigation_ids: Vec::new(),
        }
    }

    /// Create a filter for the events of one navigation.
    #[must_use]
    pub fn navigation(navigation_id: u64) -> Self {
        Self {
            topics: vec![EventTopic::Navigation],
            navigation_ids: vec![navigation_id],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &RouterEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let navigation_match = self.navigation_ids.is_empty()
            || event
                .navigation_id()
                .is_some_and(|id| self.navigation_ids.contains(&id));

        topic_match && navigation_match
    }
}
