//! Outbound ports: collaborators the navigation engine depends on.

use crate::domain::endpoint::{EndpointDeclaration, EndpointId};
use crate::domain::instruction::RoutingInstruction;
use crate::domain::navigation::{NavigationFlags, NavigationId, NavigationRecord, NavigationStoreState};
use crate::error::RouterResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a redirecting guard sends the navigation, as instruction text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(pub String);

impl From<&str> for RedirectTarget {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Result of a `canLoad` style check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Deny,
    /// Re-dispatch to other instructions, skipping the rest of this endpoint's transition.
    Redirect(RedirectTarget),
}

impl GuardOutcome {
    pub fn redirect(target: impl Into<String>) -> Self {
        Self::Redirect(RedirectTarget(target.into()))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<bool> for GuardOutcome {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

/// What to do when an endpoint is asked to host the component it already hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReloadBehavior {
    /// Skip when parameters are equal and the endpoint is stateful, refresh
    /// in place when they are equal otherwise, swap when they differ.
    #[default]
    Default,
    /// Always refresh in place.
    Reload,
    /// Skip unless the navigation is a refresh.
    Disallow,
}

/// Context handed to guards, lifecycle hooks and interceptors.
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    pub navigation_id: NavigationId,
    pub endpoint: EndpointId,
    pub endpoint_name: String,
    /// Endpoint hosting the endpoint's scope, if any.
    pub parent: Option<EndpointId>,
    pub component: String,
    pub parameters: BTreeMap<String, String>,
    /// Textual form of the instruction being applied.
    pub instruction: String,
    pub flags: NavigationFlags,
}

/// A component instance hosted by an endpoint.
///
/// Every hook has a permissive default so components only implement what
/// they care about.
#[async_trait]
pub trait RoutableComponent: Send + Sync {
    fn name(&self) -> &str;

    /// Child endpoints the component declares once loaded.
    fn endpoints(&self) -> Vec<EndpointDeclaration> {
        Vec::new()
    }

    fn title(&self) -> Option<String> {
        None
    }

    async fn can_load(&self, _context: &LifecycleContext) -> RouterResult<GuardOutcome> {
        Ok(GuardOutcome::Allow)
    }

    async fn loading(&self, _context: &LifecycleContext) -> RouterResult<()> {
        Ok(())
    }

    async fn can_unload(&self, _context: &LifecycleContext) -> RouterResult<bool> {
        Ok(true)
    }

    async fn unloading(&self, _context: &LifecycleContext) -> RouterResult<()> {
        Ok(())
    }

    /// Attach to the host.
    async fn activate(&self, _context: &LifecycleContext) -> RouterResult<()> {
        Ok(())
    }

    /// Detach from the host.
    async fn deactivate(&self, _context: &LifecycleContext) -> RouterResult<()> {
        Ok(())
    }

    /// Release the instance for good.
    async fn dispose(&self) {}
}

/// Creates component instances of one type.
pub trait ComponentFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self) -> RouterResult<Arc<dyn RoutableComponent>>;

    fn reload_behavior(&self) -> ReloadBehavior {
        ReloadBehavior::Default
    }

    /// Names given to positional parameters.
    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Factory handing out one existing instance.
pub struct InstanceFactory {
    instance: Arc<dyn RoutableComponent>,
}

impl InstanceFactory {
    pub fn new(instance: Arc<dyn RoutableComponent>) -> Self {
        Self { instance }
    }
}

impl ComponentFactory for InstanceFactory {
    fn name(&self) -> &str {
        self.instance.name()
    }

    fn create(&self) -> RouterResult<Arc<dyn RoutableComponent>> {
        Ok(self.instance.clone())
    }
}

/// Resolves component names (direct routing).
pub trait ComponentResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ComponentFactory>>;
}

/// A configured route matched against a path.
#[derive(Debug, Clone)]
pub struct FoundRoute {
    pub id: String,
    /// Matched part of the path.
    pub path: String,
    pub instructions: Vec<RoutingInstruction>,
    /// Unmatched rest of the path.
    pub remaining: String,
    pub parameters: BTreeMap<String, String>,
    pub title: Option<String>,
}

/// Configured-route lookup.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Recognize `path`, chasing at most one redirect.
    async fn find(
        &self,
        path: &str,
        parameters: &BTreeMap<String, String>,
    ) -> RouterResult<Option<FoundRoute>>;

    async fn find_by_id(&self, id: &str) -> RouterResult<Option<FoundRoute>>;
}

/// Persistence of committed navigations.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record, dropping forward entries.
    async fn push(&self, record: NavigationRecord) -> RouterResult<()>;

    /// Overwrite the record at the current index.
    async fn replace(&self, record: NavigationRecord) -> RouterResult<()>;

    /// Move the index by `delta`; `None` when the target is out of range.
    async fn go(&self, delta: isize) -> RouterResult<Option<NavigationRecord>>;

    async fn set_index(&self, index: usize) -> RouterResult<()>;

    fn index(&self) -> usize;

    fn current(&self) -> Option<NavigationRecord>;

    fn state(&self) -> NavigationStoreState;
}
