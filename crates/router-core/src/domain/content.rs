//! # Content
//!
//! One (instruction, navigation) pairing held by an endpoint's content queue.

use crate::domain::instruction::RoutingInstruction;
use crate::domain::navigation::NavigationId;
use crate::error::RouterResult;
use crate::ports::outbound::{ComponentFactory, GuardOutcome, RoutableComponent};
use bitflags::bitflags;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Content identifier, unique per router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentId(pub u64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content#{}", self.0)
    }
}

bitflags! {
    /// Checkpoints a content has passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContentStates: u8 {
        const CREATED = 1 << 0;
        const CHECKED_UNLOAD = 1 << 1;
        const CHECKED_LOAD = 1 << 2;
        const UNLOADED = 1 << 3;
        const LOADED = 1 << 4;
        const ACTIVATING = 1 << 5;
        const ACTIVATED = 1 << 6;
    }
}

/// Content hosted (or about to be hosted) by an endpoint.
#[derive(Clone)]
pub struct Content {
    pub id: ContentId,
    pub instruction: RoutingInstruction,
    pub navigation: NavigationId,
    pub states: ContentStates,
    pub component: Option<Arc<dyn RoutableComponent>>,
    pub factory: Option<Arc<dyn ComponentFactory>>,
    /// The component instance is carried over instead of created.
    pub reuse_instance: bool,
    /// Navigation the memoized guard results belong to.
    guard_navigation: NavigationId,
    can_load: Arc<OnceCell<GuardOutcome>>,
    can_unload: Arc<OnceCell<bool>>,
}

impl Content {
    pub fn new(
        id: ContentId,
        instruction: RoutingInstruction,
        navigation: NavigationId,
        factory: Option<Arc<dyn ComponentFactory>>,
    ) -> Self {
        Self {
            id,
            instruction,
            navigation,
            states: ContentStates::empty(),
            component: None,
            factory,
            reuse_instance: false,
            guard_navigation: navigation,
            can_load: Arc::default(),
            can_unload: Arc::default(),
        }
    }

    /// Content of an endpoint that hosts nothing.
    pub fn empty(id: ContentId) -> Self {
        Self::new(id, RoutingInstruction::new(""), 0, None)
    }

    /// Hosts nothing (never loaded, or cleared).
    pub fn is_empty(&self) -> bool {
        self.instruction.component.is_empty() || self.instruction.is_clear()
    }

    pub fn component_name(&self) -> &str {
        self.factory
            .as_ref()
            .map(|factory| factory.name())
            .unwrap_or_else(|| self.instruction.component_name())
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.factory
            .as_ref()
            .map(|factory| factory.parameter_names())
            .unwrap_or_default()
    }

    pub fn parameters(&self) -> BTreeMap<String, String> {
        self.instruction.parameters.normalize(&self.parameter_names())
    }

    /// Same component and equal normalized parameters.
    pub fn same_as(&self, instruction: &RoutingInstruction, component_name: &str) -> bool {
        self.component_name() == component_name
            && self
                .instruction
                .parameters
                .same(&instruction.parameters, &self.parameter_names())
    }

    /// Reuse the instance of `previous` instead of creating one.
    pub fn adopt_instance(&mut self, previous: &Content) {
        self.component = previous.component.clone();
        self.reuse_instance = self.component.is_some();
        if self.reuse_instance {
            self.states |= ContentStates::CREATED;
        }
    }

    /// Memoized guard cells, handed out so hooks run outside the tree lock.
    pub fn guards(&self) -> ContentGuards {
        ContentGuards {
            can_load: self.can_load.clone(),
            can_unload: self.can_unload.clone(),
        }
    }

    /// Forget guard results; the next check runs the hooks again.
    pub fn reset_guards(&mut self) {
        self.can_load = Arc::default();
        self.can_unload = Arc::default();
        self.states.remove(
            ContentStates::CHECKED_LOAD | ContentStates::CHECKED_UNLOAD | ContentStates::UNLOADED,
        );
    }

    /// Reset the guards when they were memoized for another navigation.
    pub fn reset_guards_for(&mut self, navigation: NavigationId) {
        if self.guard_navigation != navigation {
            self.reset_guards();
            self.guard_navigation = navigation;
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("id", &self.id)
            .field("component", &self.component_name())
            .field("navigation", &self.navigation)
            .field("states", &self.states)
            .field("reuse_instance", &self.reuse_instance)
            .finish()
    }
}

/// Guard memo cells of one content.
#[derive(Clone)]
pub struct ContentGuards {
    can_load: Arc<OnceCell<GuardOutcome>>,
    can_unload: Arc<OnceCell<bool>>,
}

impl ContentGuards {
    /// Run `check` unless a result is already memoized.
    pub async fn can_load<F, Fut>(&self, check: F) -> RouterResult<GuardOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RouterResult<GuardOutcome>>,
    {
        self.can_load.get_or_try_init(check).await.cloned()
    }

    /// Run `check` unless a result is already memoized.
    pub async fn can_unload<F, Fut>(&self, check: F) -> RouterResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RouterResult<bool>>,
    {
        self.can_unload.get_or_try_init(check).await.copied()
    }
}
