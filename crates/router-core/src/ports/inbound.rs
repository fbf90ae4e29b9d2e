//! Driving Ports (API - Inbound)
//!
//! The surface a hosting application uses to drive the router.

use crate::domain::endpoint::{EndpointDeclaration, EndpointId};
use crate::domain::navigation::{LoadInstructions, LoadOptions};
use crate::domain::scope::ScopeId;
use crate::error::RouterResult;
use async_trait::async_trait;

/// Primary router API
///
/// Every navigating method resolves `Ok(true)` once the navigation
/// committed, `Ok(false)` when it was cancelled or a guard rejected it, and
/// `Err` when it failed.
#[async_trait]
pub trait RouterApi: Send + Sync {
    /// Navigate to `instructions`.
    async fn load(&self, instructions: LoadInstructions, options: LoadOptions) -> RouterResult<bool>;

    /// Re-run the current history entry with the refresh flag.
    async fn refresh(&self) -> RouterResult<bool>;

    async fn back(&self) -> RouterResult<bool>;

    async fn forward(&self) -> RouterResult<bool>;

    /// Move `delta` entries through history. `Ok(false)` when out of range.
    async fn go(&self, delta: isize) -> RouterResult<bool>;

    /// Whether `instructions` describe (part of) the active state.
    fn check_active(&self, instructions: LoadInstructions, origin: Option<EndpointId>) -> RouterResult<bool>;

    /// Mount an endpoint under `parent` (the root scope when `None`).
    /// Returns the declared endpoint; viewport scopes also mount their
    /// template children.
    async fn connect_endpoint(
        &self,
        parent: Option<ScopeId>,
        declaration: EndpointDeclaration,
    ) -> RouterResult<EndpointId>;

    /// Unmount an endpoint and everything below it.
    async fn disconnect_endpoint(&self, endpoint: EndpointId) -> RouterResult<()>;
}
