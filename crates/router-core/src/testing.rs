//! Mock components shared by unit tests.

use crate::domain::endpoint::EndpointDeclaration;
use crate::error::RouterResult;
use crate::ports::outbound::{
    ComponentFactory, ComponentResolver, GuardOutcome, LifecycleContext, ReloadBehavior,
    RoutableComponent,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) struct MockComponent {
    name: String,
    endpoints: Vec<EndpointDeclaration>,
    can_load: GuardOutcome,
    can_unload: bool,
    log: CallLog,
}

impl MockComponent {
    pub(crate) fn arc(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            endpoints: Vec::new(),
            can_load: GuardOutcome::Allow,
            can_unload: true,
            log: CallLog::default(),
        })
    }

    fn record(&self, call: &str) {
        self.log.lock().push(format!("{call}:{}", self.name));
    }
}

#[async_trait]
impl RoutableComponent for MockComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoints(&self) -> Vec<EndpointDeclaration> {
        self.endpoints.clone()
    }

    async fn can_load(&self, _context: &LifecycleContext) -> RouterResult<GuardOutcome> {
        self.record("canLoad");
        Ok(self.can_load.clone())
    }

    async fn loading(&self, _context: &LifecycleContext) -> RouterResult<()> {
        self.record("loading");
        Ok(())
    }

    async fn can_unload(&self, _context: &LifecycleContext) -> RouterResult<bool> {
        self.record("canUnload");
        Ok(self.can_unload)
    }

    async fn unloading(&self, _context: &LifecycleContext) -> RouterResult<()> {
        self.record("unloading");
        Ok(())
    }

    async fn activate(&self, _context: &LifecycleContext) -> RouterResult<()> {
        self.record("activate");
        Ok(())
    }

    async fn deactivate(&self, _context: &LifecycleContext) -> RouterResult<()> {
        self.record("deactivate");
        Ok(())
    }

    async fn dispose(&self) {
        self.record("dispose");
    }
}

pub(crate) struct MockFactory {
    name: String,
    behavior: ReloadBehavior,
    endpoints: Vec<EndpointDeclaration>,
    can_load: GuardOutcome,
    can_unload: bool,
    pub(crate) log: CallLog,
    pub(crate) created: AtomicUsize,
}

impl MockFactory {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: ReloadBehavior::Default,
            endpoints: Vec::new(),
            can_load: GuardOutcome::Allow,
            can_unload: true,
            log: CallLog::default(),
            created: AtomicUsize::new(0),
        }
    }

    pub(crate) fn arc(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub(crate) fn with_behavior(name: &str, behavior: ReloadBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Self::new(name)
        })
    }

    pub(crate) fn endpoints(mut self, endpoints: Vec<EndpointDeclaration>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub(crate) fn can_load(mut self, outcome: GuardOutcome) -> Self {
        self.can_load = outcome;
        self
    }

    pub(crate) fn can_unload(mut self, allowed: bool) -> Self {
        self.can_unload = allowed;
        self
    }

    pub(crate) fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ComponentFactory for MockFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> RouterResult<Arc<dyn RoutableComponent>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockComponent {
            name: self.name.clone(),
            endpoints: self.endpoints.clone(),
            can_load: self.can_load.clone(),
            can_unload: self.can_unload,
            log: self.log.clone(),
        }))
    }

    fn reload_behavior(&self) -> ReloadBehavior {
        self.behavior
    }
}

/// Resolver over a fixed set of mock factories.
#[derive(Default)]
pub(crate) struct MockResolver {
    factories: HashMap<String, Arc<MockFactory>>,
}

impl MockResolver {
    pub(crate) fn with(mut self, factory: MockFactory) -> Self {
        self.factories.insert(factory.name.clone(), Arc::new(factory));
        self
    }

    pub(crate) fn factory(&self, name: &str) -> Option<Arc<MockFactory>> {
        self.factories.get(name).cloned()
    }
}

impl ComponentResolver for MockResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.factories
            .get(name)
            .map(|factory| factory.clone() as Arc<dyn ComponentFactory>)
    }
}
