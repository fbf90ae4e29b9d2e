//! # Test Fixtures
//!
//! Recording components and a router harness shared by the flows.

use async_trait::async_trait;
use parking_lot::Mutex;
use router_bus::InMemoryEventBus;
use router_core::{
    ComponentRegistry, EndpointDeclaration, EndpointId, FnComponentFactory, GuardOutcome,
    InMemoryHistory, LifecycleContext, RedirectTarget, RoutableComponent, RouteTable, Router,
    RouterConfig, RouterPorts, RouterResult, ViewportOptions,
};
use router_core::ports::inbound::RouterApi;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Ordered record of every lifecycle call, as `"call:component"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Fail instead of hanging when a navigation never settles.
pub async fn within<F: Future>(future: F) -> F::Output {
    timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out waiting for the router")
}

/// Holds a lifecycle call until the test opens it.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Wait until a component reached the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

/// What a registered component does when the router calls it.
#[derive(Clone)]
pub struct Behavior {
    endpoints: Vec<EndpointDeclaration>,
    can_load: GuardOutcome,
    can_unload: bool,
    title: Option<String>,
    loading_gate: Option<Gate>,
    deactivate_gate: Option<Gate>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            can_load: GuardOutcome::Allow,
            can_unload: true,
            title: None,
            loading_gate: None,
            deactivate_gate: None,
        }
    }
}

impl Behavior {
    pub fn endpoints(mut self, endpoints: Vec<EndpointDeclaration>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn viewport(self, name: &str) -> Self {
        self.endpoints(vec![ViewportOptions::new(name).into()])
    }

    pub fn deny_load(mut self) -> Self {
        self.can_load = GuardOutcome::Deny;
        self
    }

    pub fn redirect(mut self, target: &str) -> Self {
        self.can_load = GuardOutcome::Redirect(RedirectTarget(target.to_string()));
        self
    }

    pub fn deny_unload(mut self) -> Self {
        self.can_unload = false;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn hold_loading(mut self, gate: &Gate) -> Self {
        self.loading_gate = Some(gate.clone());
        self
    }

    pub fn hold_deactivate(mut self, gate: &Gate) -> Self {
        self.deactivate_gate = Some(gate.clone());
        self
    }
}

struct TestComponent {
    name: String,
    behavior: Behavior,
    log: CallLog,
}

impl TestComponent {
    fn record(&self, call: &str) {
        self.log.lock().push(format!("{call}:{}", self.name));
    }
}

#[async_trait]
impl RoutableComponent for TestComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoints(&self) -> Vec<EndpointDeclaration> {
        self.behavior.endpoints.clone()
    }

    fn title(&self) -> Option<String> {
        self.behavior.title.clone()
    }

    async fn can_load(&self, _context: &LifecycleContext) -> RouterResult<GuardOutcome> {
        self.record("canLoad");
        Ok(self.behavior.can_load.clone())
    }

    async fn loading(&self, _context: &LifecycleContext) -> RouterResult<()> {
        self.record("loading");
        if let Some(gate) = &self.behavior.loading_gate {
            gate.pass().await;
        }
        Ok(())
    }

    async fn can_unload(&self, _context: &LifecycleContext) -> RouterResult<bool> {
        self.record("canUnload");
        Ok(self.behavior.can_unload)
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
        if let Some(gate) = &self.behavior.deactivate_gate {
            gate.pass().await;
        }
        Ok(())
    }

    async fn dispose(&self) {
        self.record("dispose");
    }
}

/// A router over a component registry, an in-memory history and an event bus.
pub struct Harness {
    pub router: Router,
    pub bus: Arc<InMemoryEventBus>,
    pub registry: Arc<ComponentRegistry>,
    pub log: CallLog,
}

impl Harness {
    pub fn new(config: RouterConfig) -> Self {
        Self::build(config, None, None)
    }

    pub fn with_routes(config: RouterConfig, routes: RouteTable) -> Self {
        Self::build(config, Some(routes), None)
    }

    pub fn with_history(config: RouterConfig, history: Arc<InMemoryHistory>) -> Self {
        Self::build(config, None, Some(history))
    }

    fn build(
        config: RouterConfig,
        routes: Option<RouteTable>,
        history: Option<Arc<InMemoryHistory>>,
    ) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let registry = Arc::new(ComponentRegistry::new());
        let mut ports = RouterPorts::new(registry.clone()).with_events(bus.clone());
        if let Some(routes) = routes {
            ports = ports.with_routes(Arc::new(routes));
        }
        if let Some(history) = history {
            ports = ports.with_history(history);
        }
        Self {
            router: Router::new(config, ports),
            bus,
            registry,
            log: CallLog::default(),
        }
    }

    /// Register a component type; every load creates a fresh instance.
    pub fn register(&self, name: &str, behavior: Behavior) -> &Self {
        let (component, log) = (name.to_string(), self.log.clone());
        self.registry.register(Arc::new(FnComponentFactory::new(name, move || {
            Ok(Arc::new(TestComponent {
                name: component.clone(),
                behavior: behavior.clone(),
                log: log.clone(),
            }) as Arc<dyn RoutableComponent>)
        })));
        self
    }

    pub async fn viewport(&self, options: ViewportOptions) -> EndpointId {
        self.router
            .connect_endpoint(None, options.into())
            .await
            .expect("connect viewport")
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.log.lock().iter().filter(|entry| entry.as_str() == call).count()
    }

    /// Positions of the log entries starting with `prefix`.
    pub fn positions(&self, prefix: &str) -> Vec<usize> {
        self.log
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.starts_with(prefix))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}
