//! Error types for the navigation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which routing modes were enabled when a segment could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// Only direct routing (segment is a component name).
    Direct,
    /// Only configured routes.
    Configured,
    /// Configured routes first, then direct routing.
    DirectAndConfigured,
    /// Both modes disabled.
    Disabled,
}

impl RoutingMode {
    /// Mode for a pair of configuration switches.
    pub fn from_flags(direct: bool, configured: bool) -> Self {
        match (direct, configured) {
            (true, true) => Self::DirectAndConfigured,
            (true, false) => Self::Direct,
            (false, true) => Self::Configured,
            (false, false) => Self::Disabled,
        }
    }

    fn describe(&self, segment: &str) -> String {
        match self {
            Self::Direct => format!("No component named '{segment}' is registered (direct routing)"),
            Self::Configured => {
                format!("No configured route matches '{segment}' and direct routing is disabled")
            }
            Self::DirectAndConfigured => {
                format!("Neither a configured route nor a component matches '{segment}'")
            }
            Self::Disabled => {
                format!("Cannot resolve '{segment}': direct and configured routing are both disabled")
            }
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Configured => "configured",
            Self::DirectAndConfigured => "direct+configured",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Navigation engine errors
///
/// Guard rejection and cancellation surface as `Ok(false)` from
/// `Router::load`; `Cancelled` only travels inside the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    /// Malformed instruction text
    #[error("Invalid instructions '{input}' at {position}: {reason}")]
    Parse {
        input: String,
        position: usize,
        reason: String,
    },

    /// No route or component for a segment
    #[error("{}", .mode.describe(.segment))]
    UnresolvedConfiguration { segment: String, mode: RoutingMode },

    /// Matching or processing did not reach a fixed point
    #[error("Unresolved instructions after {iterations} iterations, likely an infinite loop: {remaining:?}")]
    UnresolvedInstructions {
        iterations: usize,
        remaining: Vec<String>,
    },

    /// A component referenced by configuration is not registered
    #[error("Component not found: {name}")]
    ComponentNotFound { name: String },

    /// An interceptor or lifecycle hook failed
    #[error("Hook '{hook}' failed: {reason}")]
    HookFailed { hook: String, reason: String },

    /// A component could not be created, activated or deactivated
    #[error("Component '{component}' failed: {reason}")]
    ComponentFailed { component: String, reason: String },

    /// Endpoint id not present in the routing scope tree
    #[error("Unknown endpoint: {id}")]
    UnknownEndpoint { id: u64 },

    /// History store failure
    #[error("History error: {reason}")]
    History { reason: String },

    /// The navigation was cancelled
    #[error("Navigation cancelled")]
    Cancelled,

    /// Engine invariant violated
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl RouterError {
    /// Shorthand for a hook failure.
    pub fn hook(hook: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::HookFailed {
            hook: hook.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for an internal failure.
    pub fn internal(reason: impl fmt::Display) -> Self {
        Self::Internal {
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
