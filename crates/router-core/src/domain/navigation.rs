//! # Navigation
//!
//! One requested transition, its lifecycle states and its history record.

use crate::domain::instruction::RoutingInstruction;
use crate::error::RouterError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Navigation sequence number. `0` is reserved for the initial empty state.
pub type NavigationId = u64;

/// Checkpoints an endpoint reports while transitioning, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum NavigationState {
    GuardedUnload,
    GuardedLoad,
    Guarded,
    Unloaded,
    Loaded,
    Routed,
    Swapped,
    Completed,
}

impl NavigationState {
    pub const ALL: [Self; 8] = [
        Self::GuardedUnload,
        Self::GuardedLoad,
        Self::Guarded,
        Self::Unloaded,
        Self::Loaded,
        Self::Routed,
        Self::Swapped,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardedUnload => "guardedUnload",
            Self::GuardedLoad => "guardedLoad",
            Self::Guarded => "guarded",
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Routed => "routed",
            Self::Swapped => "swapped",
            Self::Completed => "completed",
        }
    }

    /// This state and every state before it.
    pub fn up_to(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().take_while(move |state| *state <= self)
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Why a navigation happens.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NavigationFlags: u8 {
        const FIRST = 1 << 0;
        const NEW = 1 << 1;
        const REFRESH = 1 << 2;
        const FORWARD = 1 << 3;
        const BACK = 1 << 4;
        const REPLACE = 1 << 5;
    }
}

/// How a navigation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed,
    Cancelled,
    Failed(RouterError),
}

/// Settle-once completion of a navigation.
#[derive(Debug, Clone)]
pub struct NavigationCompletion {
    sender: Arc<watch::Sender<Option<NavigationOutcome>>>,
}

impl Default for NavigationCompletion {
    fn default() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }
}

impl NavigationCompletion {
    /// Settle the navigation. Returns `false` when it was already settled.
    pub fn settle(&self, outcome: NavigationOutcome) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    pub fn outcome(&self) -> Option<NavigationOutcome> {
        self.sender.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Wait until settled.
    pub async fn wait(&self) -> NavigationOutcome {
        let mut receiver = self.sender.subscribe();
        loop {
            if let Some(outcome) = receiver.borrow_and_update().clone() {
                return outcome;
            }
            if receiver.changed().await.is_err() {
                // The sender lives as long as `self`.
                return NavigationOutcome::Cancelled;
            }
        }
    }
}

/// One requested transition.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub id: NavigationId,
    /// Instruction text as requested (after URL transforms).
    pub instruction: String,
    pub instructions: Vec<RoutingInstruction>,
    /// Complete tree text, set for history restoration.
    pub full_state_instruction: Option<String>,
    pub flags: NavigationFlags,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub previous: Option<NavigationId>,
    pub title: Option<String>,
    pub query: String,
    pub fragment: String,
    pub parameters: BTreeMap<String, String>,
    pub data: serde_json::Value,
    pub completion: NavigationCompletion,
}

impl Navigation {
    pub fn new(id: NavigationId, instructions: Vec<RoutingInstruction>) -> Self {
        Self {
            id,
            instruction: String::new(),
            instructions,
            full_state_instruction: None,
            flags: NavigationFlags::NEW,
            timestamp: now_millis(),
            previous: None,
            title: None,
            query: String::new(),
            fragment: String::new(),
            parameters: BTreeMap::new(),
            data: serde_json::Value::Null,
            completion: NavigationCompletion::default(),
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.flags.contains(NavigationFlags::REFRESH)
    }

    pub fn is_history_move(&self) -> bool {
        self.flags
            .intersects(NavigationFlags::BACK | NavigationFlags::FORWARD)
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Persisted form of a committed navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRecord {
    pub index: usize,
    pub instruction: String,
    pub full_state_instruction: String,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub fragment: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: u64,
}

/// Persisted history: `{ navigations, navigationIndex }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationStoreState {
    pub navigations: Vec<NavigationRecord>,
    pub navigation_index: usize,
}

/// What to navigate to.
#[derive(Debug, Clone)]
pub enum LoadInstructions {
    Text(String),
    Instructions(Vec<RoutingInstruction>),
}

impl From<&str> for LoadInstructions {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for LoadInstructions {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<RoutingInstruction>> for LoadInstructions {
    fn from(instructions: Vec<RoutingInstruction>) -> Self {
        Self::Instructions(instructions)
    }
}

impl From<RoutingInstruction> for LoadInstructions {
    fn from(instruction: RoutingInstruction) -> Self {
        Self::Instructions(vec![instruction])
    }
}

/// Options of a load request.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub title: Option<String>,
    pub query: String,
    pub fragment: String,
    pub parameters: BTreeMap<String, String>,
    pub data: Option<serde_json::Value>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// Endpoint whose scope relative instructions resolve against.
    pub origin: Option<crate::domain::endpoint::EndpointId>,
}
