//! # Router Bus - Event Bus for Navigation Notifications
//!
//! Carries the notifications the navigation engine publishes while it drives a
//! navigation: start, failure, cancellation, end, and endpoint (de)registration.
//!
//! ## Ordering
//!
//! For one navigation the engine always publishes:
//!
//! ```text
//! NavigationStarted ──→ [NavigationFailed | NavigationCancelled] ──→ NavigationEnded
//! ```
//!
//! `NavigationEnded` is the last notification of a navigation, whatever its outcome.
//!
//! ## Choreography
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │    Router    │                    │   Observer   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, NavigationOutcome, RouterEvent};
pub use publisher::{EventPublisher, InMemoryEventBus, NullEventPublisher};
pub use subscriber::Subscription;

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
