//! Router configuration

use crate::domain::navigation::NavigationState;
use crate::domain::parser::Separators;
use crate::error::{RouterError, RouterResult, RoutingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Order in which the outgoing component is detached and the incoming one
/// attached when an endpoint swaps content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapOrder {
    #[default]
    AttachNextDetachCurrent,
    DetachCurrentAttachNext,
    AttachDetachSimultaneously,
    DetachAttachSimultaneously,
}

impl SwapOrder {
    pub fn is_simultaneous(&self) -> bool {
        matches!(
            self,
            Self::AttachDetachSimultaneously | Self::DetachAttachSimultaneously
        )
    }

    /// Whether the incoming component is attached first.
    pub fn attach_first(&self) -> bool {
        matches!(
            self,
            Self::AttachNextDetachCurrent | Self::AttachDetachSimultaneously
        )
    }
}

/// Router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Instruction segments name components directly.
    pub use_direct_routing: bool,
    /// Paths are recognized through the configured-route resolver first.
    pub use_configured_routes: bool,
    pub swap_order: SwapOrder,
    /// Checkpoints every participating endpoint synchronises on.
    pub sync_states: Vec<NavigationState>,
    /// Rounds one scope pass may take to route its instructions, and how
    /// many viewport defaults may nest below each other.
    pub max_processing_iterations: usize,
    /// Bound of one matcher run.
    pub max_match_iterations: usize,
    /// Component used when a requested one cannot be resolved.
    pub fallback: Option<String>,
    /// Superseded contents kept per stateful viewport.
    pub stateful_cache_size: usize,
    /// Clear endpoints a navigation does not mention, unless it starts with
    /// the add token.
    pub clear_unspecified: bool,
    pub separators: Separators,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            use_direct_routing: true,
            use_configured_routes: true,
            swap_order: SwapOrder::default(),
            sync_states: vec![
                NavigationState::GuardedUnload,
                NavigationState::Swapped,
                NavigationState::Completed,
            ],
            max_processing_iterations: 100,
            max_match_iterations: 100,
            fallback: None,
            stateful_cache_size: 10,
            clear_unspecified: false,
            separators: Separators::default(),
        }
    }
}

impl RouterConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> RouterResult<Self> {
        serde_json::from_str(json).map_err(|e| RouterError::internal(format!("invalid router config: {e}")))
    }

    /// Configured sync states, `completed` always included.
    pub fn effective_sync_states(&self) -> BTreeSet<NavigationState> {
        self.sync_states
            .iter()
            .copied()
            .chain(std::iter::once(NavigationState::Completed))
            .collect()
    }

    pub fn routing_mode(&self) -> RoutingMode {
        RoutingMode::from_flags(self.use_direct_routing, self.use_configured_routes)
    }
}
