//! Component registry adapter
//!
//! Implements the `ComponentResolver` port for direct routing: instruction
//! segments are looked up by component name.

use crate::error::RouterResult;
use crate::ports::outbound::{ComponentFactory, ComponentResolver, ReloadBehavior, RoutableComponent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type CreateFn = Arc<dyn Fn() -> RouterResult<Arc<dyn RoutableComponent>> + Send + Sync>;

/// Factory backed by a closure.
pub struct FnComponentFactory {
    name: String,
    create: CreateFn,
    reload_behavior: ReloadBehavior,
    parameter_names: Vec<String>,
}

impl FnComponentFactory {
    pub fn new<F>(name: impl Into<String>, create: F) -> Self
    where
        F: Fn() -> RouterResult<Arc<dyn RoutableComponent>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            create: Arc::new(create),
            reload_behavior: ReloadBehavior::Default,
            parameter_names: Vec::new(),
        }
    }

    pub fn with_reload_behavior(mut self, behavior: ReloadBehavior) -> Self {
        self.reload_behavior = behavior;
        self
    }

    pub fn with_parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_names = names.into_iter().map(Into::into).collect();
        self
    }
}

impl ComponentFactory for FnComponentFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> RouterResult<Arc<dyn RoutableComponent>> {
        (self.create)()
    }

    fn reload_behavior(&self) -> ReloadBehavior {
        self.reload_behavior
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameter_names.clone()
    }
}

/// Name to factory map.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ComponentFactory>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its own name, replacing an earlier one.
    pub fn register(&self, factory: Arc<dyn ComponentFactory>) {
        let name = factory.name().to_string();
        debug!(component = %name, "Component registered");
        self.factories.write().insert(name, factory);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(self, factory: impl ComponentFactory + 'static) -> Self {
        self.register(Arc::new(factory));
        self
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl ComponentResolver for ComponentRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.factories.read().get(name).cloned()
    }
}
