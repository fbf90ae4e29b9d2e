//! Router Service - Navigation entry point
//!
//! Implements [`RouterApi`] on top of the domain layer and the outbound
//! ports.
//!
//! ```text
//!  load(text) ─► transform_from_url ─► route lookup / parse
//!             ─► FIFO queue ─► before_navigation
//!             ─► scope passes ──► match ─► set_next_content ─► transition
//!                     ▲                                          │ loaded
//!                     └──────────── child scope pass ◄───────────┘
//!             ─► completed barrier ─► finalize ─► history ─► events
//! ```
//!
//! Navigations are serialized: a request waits for the one before it to
//! commit or roll back.

mod describe;
mod processing;
mod transition;

use crate::adapters::InMemoryHistory;
use crate::config::RouterConfig;
use crate::domain::content::{Content, ContentStates};
use crate::domain::coordinator::{ContentLifecycle, NavigationCoordinator};
use crate::domain::endpoint::{Endpoint, EndpointDeclaration, EndpointId};
use crate::domain::instruction::RoutingInstruction;
use crate::domain::navigation::{
    LoadInstructions, LoadOptions, Navigation, NavigationFlags, NavigationId, NavigationOutcome,
    NavigationRecord, NavigationState, NavigationStoreState,
};
use crate::domain::parser::InstructionParser;
use crate::domain::scope::{ContentChange, RouterTree, ScopeId};
use crate::error::{RouterError, RouterResult};
use crate::hooks::HookRegistry;
use crate::metrics::{self, NavigationTimer};
use crate::ports::inbound::RouterApi;
use crate::ports::outbound::{
    ComponentResolver, HistoryStore, LifecycleContext, RoutableComponent, RouteResolver,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use router_bus::{EventPublisher, NullEventPublisher, RouterEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outbound dependencies of a router.
#[derive(Clone)]
pub struct RouterPorts {
    pub components: Arc<dyn ComponentResolver>,
    pub routes: Option<Arc<dyn RouteResolver>>,
    pub history: Arc<dyn HistoryStore>,
    pub hooks: HookRegistry,
    pub events: Arc<dyn EventPublisher>,
}

impl RouterPorts {
    /// Direct routing over `components`, in-memory history, no observers.
    pub fn new(components: Arc<dyn ComponentResolver>) -> Self {
        Self {
            components,
            routes: None,
            history: Arc::new(InMemoryHistory::new()),
            hooks: HookRegistry::new(),
            events: Arc::new(NullEventPublisher::default()),
        }
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteResolver>) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

/// Component work left behind by a commit or rollback, run once the tree
/// lock is released.
enum Retired {
    Dispose {
        component: Arc<dyn RoutableComponent>,
        /// Set when the component is still attached.
        deactivate: Option<LifecycleContext>,
    },
    Reactivate {
        component: Arc<dyn RoutableComponent>,
        context: LifecycleContext,
    },
    Disconnected {
        endpoint: EndpointId,
        name: String,
    },
}

pub(crate) struct RouterInner {
    config: RouterConfig,
    parser: InstructionParser,
    ports: RouterPorts,
    tree: Mutex<RouterTree>,
    /// Admission queue; tokio's mutex is FIFO.
    queue: tokio::sync::Mutex<()>,
    next_navigation: AtomicU64,
    active: Mutex<Option<Arc<NavigationCoordinator>>>,
    last_committed: Mutex<Option<NavigationId>>,
    retired: Mutex<Vec<Retired>>,
}

/// The navigation engine. Cheap to clone; clones share one router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(config: RouterConfig, ports: RouterPorts) -> Self {
        let parser = InstructionParser::new(config.separators.clone());
        let tree = RouterTree::new(config.stateful_cache_size);
        info!(
            mode = %config.routing_mode(),
            swap_order = ?config.swap_order,
            "Router created"
        );
        Self {
            inner: Arc::new(RouterInner {
                config,
                parser,
                ports,
                tree: Mutex::new(tree),
                queue: tokio::sync::Mutex::new(()),
                next_navigation: AtomicU64::new(1),
                active: Mutex::new(None),
                last_committed: Mutex::new(None),
                retired: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn parser(&self) -> &InstructionParser {
        &self.inner.parser
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.ports.hooks
    }

    pub fn root_scope(&self) -> ScopeId {
        self.inner.tree.lock().root()
    }

    /// Scope holding the children of `endpoint`.
    pub fn endpoint_scope(&self, endpoint: EndpointId) -> Option<ScopeId> {
        self.inner.tree.lock().endpoint(endpoint).map(|e| e.scope)
    }

    /// Visible endpoint named `name` below the root scope.
    pub fn find_endpoint(&self, name: &str) -> Option<EndpointId> {
        let tree = self.inner.tree.lock();
        tree.find_endpoint(tree.root(), name)
    }

    /// Name of the component `endpoint` currently hosts.
    pub fn active_component(&self, endpoint: EndpointId) -> Option<String> {
        let tree = self.inner.tree.lock();
        let content = tree.endpoint(endpoint)?.content();
        (!content.is_empty()).then(|| content.component_name().to_string())
    }

    pub fn parse(&self, text: &str) -> RouterResult<Vec<RoutingInstruction>> {
        self.inner.parser.parse(text)
    }

    /// Navigate to `instructions`.
    pub async fn load(
        &self,
        instructions: impl Into<LoadInstructions>,
        options: LoadOptions,
    ) -> RouterResult<bool> {
        let origin = options.origin;
        let Some(navigation) = self.inner.prepare(instructions.into(), options).await? else {
            return Ok(false);
        };
        self.inner.navigate(navigation, origin).await
    }

    /// Stop the navigation in flight. `false` when none is running.
    pub fn cancel(&self) -> bool {
        let active = self.inner.active.lock().clone();
        match active {
            Some(coordinator) => {
                coordinator.cancel(&*self.inner, "cancelled by request");
                true
            }
            None => false,
        }
    }

    /// Active state below the root, grouping endpoints left out.
    pub fn active_instructions(&self) -> Vec<RoutingInstruction> {
        let tree = self.inner.tree.lock();
        describe::flatten(&tree, tree.active_instructions(tree.root()))
    }

    /// Path of the active state, as it would be recorded in history.
    pub fn current_path(&self) -> String {
        let path = {
            let tree = self.inner.tree.lock();
            let active = describe::flatten(&tree, tree.active_instructions(tree.root()));
            self.inner
                .parser
                .stringify_with(&active, &describe::PathDescriber { tree: &tree }, false)
        };
        self.inner.ports.hooks.transform_to_url(path)
    }

    pub fn history_state(&self) -> NavigationStoreState {
        self.inner.ports.history.state()
    }

    async fn history_move(&self, delta: isize) -> RouterResult<bool> {
        let history = &self.inner.ports.history;
        let previous = history.index();
        let Some(record) = history.go(delta).await? else {
            debug!(delta, "History move out of range");
            return Ok(false);
        };
        let flags = if delta < 0 {
            NavigationFlags::BACK
        } else {
            NavigationFlags::FORWARD
        };
        let result = self.replay(record, flags).await;
        if !matches!(result, Ok(true)) {
            history.set_index(previous).await?;
        }
        result
    }

    async fn replay(&self, record: NavigationRecord, flags: NavigationFlags) -> RouterResult<bool> {
        let instructions = self.inner.parser.parse(&record.full_state_instruction)?;
        let mut navigation = Navigation::new(self.inner.next_id(), instructions);
        navigation.instruction = record.instruction;
        navigation.full_state_instruction = Some(record.full_state_instruction);
        navigation.flags = flags;
        navigation.title = record.title;
        navigation.query = record.query;
        navigation.fragment = record.fragment;
        navigation.parameters = record.parameters;
        navigation.data = record.data;
        navigation.previous = *self.inner.last_committed.lock();
        self.inner.navigate(navigation, None).await
    }
}

#[async_trait]
impl RouterApi for Router {
    async fn load(&self, instructions: LoadInstructions, options: LoadOptions) -> RouterResult<bool> {
        Router::load(self, instructions, options).await
    }

    async fn refresh(&self) -> RouterResult<bool> {
        let Some(record) = self.inner.ports.history.current() else {
            return Ok(false);
        };
        self.replay(record, NavigationFlags::REFRESH | NavigationFlags::REPLACE)
            .await
    }

    async fn back(&self) -> RouterResult<bool> {
        self.history_move(-1).await
    }

    async fn forward(&self) -> RouterResult<bool> {
        self.history_move(1).await
    }

    async fn go(&self, delta: isize) -> RouterResult<bool> {
        if delta == 0 {
            return self.refresh().await;
        }
        self.history_move(delta).await
    }

    fn check_active(&self, instructions: LoadInstructions, origin: Option<EndpointId>) -> RouterResult<bool> {
        let wanted = match instructions {
            LoadInstructions::Text(text) => self.inner.parser.parse(&text)?,
            LoadInstructions::Instructions(instructions) => instructions,
        };
        if wanted.is_empty() {
            return Ok(false);
        }
        let tree = self.inner.tree.lock();
        let scope = match origin {
            Some(id) => tree.require(id)?.scope,
            None => tree.root(),
        };
        let active = describe::flatten(&tree, tree.active_instructions(scope));
        Ok(wanted.iter().all(|instruction| describe::contains(&active, instruction)))
    }

    async fn connect_endpoint(
        &self,
        parent: Option<ScopeId>,
        declaration: EndpointDeclaration,
    ) -> RouterResult<EndpointId> {
        let connected = {
            let mut tree = self.inner.tree.lock();
            let parent = parent.unwrap_or_else(|| tree.root());
            let ids = tree.connect_endpoint(parent, None, declaration)?;
            metrics::set_active_endpoints(tree.endpoint_count());
            ids.into_iter()
                .filter_map(|id| tree.endpoint(id).map(|e| (id, e.name().to_string())))
                .collect::<Vec<_>>()
        };
        let first = connected
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| RouterError::internal("nothing was connected"))?;
        for (id, name) in connected {
            self.inner
                .publish(RouterEvent::EndpointConnected {
                    endpoint_id: id.0,
                    name,
                })
                .await;
        }
        Ok(first)
    }

    async fn disconnect_endpoint(&self, endpoint: EndpointId) -> RouterResult<()> {
        let removed = {
            let mut tree = self.inner.tree.lock();
            tree.require(endpoint)?;
            let removed = tree.disconnect_endpoint(endpoint);
            metrics::set_active_endpoints(tree.endpoint_count());
            removed
        };
        self.inner.retire_endpoints(removed, 0);
        self.inner.drain_retired().await;
        Ok(())
    }
}

impl RouterInner {
    fn next_id(&self) -> NavigationId {
        self.next_navigation.fetch_add(1, Ordering::SeqCst)
    }

    async fn publish(&self, event: RouterEvent) {
        self.ports.events.publish(event).await;
    }

    /// Context for a lifecycle call on `content` hosted by `endpoint`.
    fn context(
        &self,
        tree: &RouterTree,
        endpoint: &Endpoint,
        content: &Content,
        navigation: &Navigation,
    ) -> LifecycleContext {
        LifecycleContext {
            navigation_id: navigation.id,
            endpoint: endpoint.id,
            endpoint_name: endpoint.name().to_string(),
            parent: tree.parent_endpoint(endpoint.id),
            component: content.component_name().to_string(),
            parameters: content.parameters(),
            instruction: self
                .parser
                .stringify(std::slice::from_ref(&content.instruction.clone_shallow())),
            flags: navigation.flags,
        }
    }

    /// Context for a component leaving the tree outside of a transition.
    fn detached_context(
        endpoint: EndpointId,
        name: &str,
        component: &dyn RoutableComponent,
        navigation: NavigationId,
    ) -> LifecycleContext {
        LifecycleContext {
            navigation_id: navigation,
            endpoint,
            endpoint_name: name.to_string(),
            parent: None,
            component: component.name().to_string(),
            parameters: Default::default(),
            instruction: component.name().to_string(),
            flags: NavigationFlags::empty(),
        }
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Turn a load request into a navigation. `None` when a URL transform
    /// vetoed it.
    async fn prepare(
        &self,
        instructions: LoadInstructions,
        options: LoadOptions,
    ) -> RouterResult<Option<Navigation>> {
        let (text, instructions, route_title) = match instructions {
            LoadInstructions::Text(text) => {
                let Some(text) = self.ports.hooks.transform_from_url(text) else {
                    info!("URL transform vetoed the navigation");
                    return Ok(None);
                };
                let (instructions, title) = self.recognize(&text, &options).await?;
                (text, instructions, title)
            }
            LoadInstructions::Instructions(instructions) => {
                let text = self.parser.stringify(&instructions);
                (text, instructions, None)
            }
        };

        let mut navigation = Navigation::new(self.next_id(), instructions);
        navigation.instruction = text;
        if self.ports.history.state().navigations.is_empty() {
            navigation.flags |= NavigationFlags::FIRST;
        }
        if options.replace {
            navigation.flags |= NavigationFlags::REPLACE;
        }
        navigation.title = options.title.or(route_title);
        navigation.query = options.query;
        navigation.fragment = options.fragment;
        navigation.parameters = options.parameters;
        navigation.data = options.data.unwrap_or_default();
        navigation.previous = *self.last_committed.lock();
        Ok(Some(navigation))
    }

    /// Configured routes first, then direct routing.
    async fn recognize(
        &self,
        text: &str,
        options: &LoadOptions,
    ) -> RouterResult<(Vec<RoutingInstruction>, Option<String>)> {
        if self.config.use_configured_routes {
            if let Some(routes) = &self.ports.routes {
                if let Some(found) = routes.find(text, &options.parameters).await? {
                    debug!(route = %found.id, path = %found.path, remaining = %found.remaining, "Route recognized");
                    let mut instructions = found.instructions;
                    let rest = self.parser.parse(&found.remaining)?;
                    if !rest.is_empty() {
                        match instructions.last_mut() {
                            Some(last) => {
                                let mut children = last.next_scope_instructions.take().unwrap_or_default();
                                children.extend(rest);
                                last.next_scope_instructions = Some(children);
                            }
                            None => instructions = rest,
                        }
                    }
                    return Ok((instructions, found.title));
                }
            }
        }
        if self.config.use_direct_routing || text.is_empty() {
            return Ok((self.parser.parse(text)?, None));
        }
        Err(RouterError::UnresolvedConfiguration {
            segment: text
                .split(self.parser.separators().scope.as_str())
                .next()
                .unwrap_or(text)
                .to_string(),
            mode: self.config.routing_mode(),
        })
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    async fn navigate(
        self: &Arc<Self>,
        navigation: Navigation,
        origin: Option<EndpointId>,
    ) -> RouterResult<bool> {
        let _turn = self.queue.lock().await;
        let navigation = Arc::new(navigation);
        let _timer = NavigationTimer::start();
        info!(
            navigation_id = navigation.id,
            instruction = %navigation.instruction,
            flags = ?navigation.flags,
            "Navigation started"
        );
        self.publish(RouterEvent::NavigationStarted {
            navigation_id: navigation.id,
            instruction: navigation.instruction.clone(),
        })
        .await;

        match self.ports.hooks.before_navigation(&navigation).await {
            Ok(true) => {}
            Ok(false) => {
                metrics::record_guard_rejection("before_navigation");
                navigation.completion.settle(NavigationOutcome::Cancelled);
                return self
                    .end_cancelled(&navigation, "vetoed by a navigation hook".to_string())
                    .await;
            }
            Err(err) => {
                navigation.completion.settle(NavigationOutcome::Failed(err.clone()));
                return self.end_failed(&navigation, err).await;
            }
        }

        let coordinator = NavigationCoordinator::new(
            Arc::clone(&navigation),
            self.config.effective_sync_states(),
            self.config.max_processing_iterations,
        );
        *self.active.lock() = Some(Arc::clone(&coordinator));
        let result = self.run(&coordinator, origin).await;
        self.active.lock().take();

        let result = match result {
            Ok(()) => match self.commit(&navigation).await {
                Ok(path) => {
                    info!(navigation_id = navigation.id, %path, "Navigation committed");
                    metrics::record_navigation(router_bus::NavigationOutcome::Committed);
                    self.publish(RouterEvent::NavigationEnded {
                        navigation_id: navigation.id,
                        outcome: router_bus::NavigationOutcome::Committed,
                        path,
                    })
                    .await;
                    Ok(true)
                }
                Err(err) => self.end_failed(&navigation, err).await,
            },
            Err(err) => {
                coordinator.fail(err, &**self);
                // Lifecycle calls already in flight finish before the end is
                // reported.
                for transition in coordinator.take_transitions() {
                    if let Err(err) = transition.await {
                        debug!(navigation_id = navigation.id, error = %err, "Transition stopped");
                    }
                }
                match coordinator.failure() {
                    Some(err) => self.end_failed(&navigation, err).await,
                    None => {
                        let reason = coordinator
                            .cancel_reason()
                            .unwrap_or_else(|| "cancelled".to_string());
                        self.end_cancelled(&navigation, reason).await
                    }
                }
            }
        };
        self.drain_retired().await;
        result
    }

    async fn run(
        self: &Arc<Self>,
        coordinator: &Arc<NavigationCoordinator>,
        origin: Option<EndpointId>,
    ) -> RouterResult<()> {
        let groups = {
            let tree = self.tree.lock();
            let base = match origin {
                Some(id) => tree.require(id)?.scope,
                None => tree.root(),
            };
            let separators = self.parser.separators();
            let parent_token = format!("{}{}", separators.parent_scope, separators.scope);

            let mut groups: Vec<(ScopeId, Vec<RoutingInstruction>)> = Vec::new();
            for instruction in coordinator.navigation().instructions.iter().cloned() {
                let scope = tree.scope_for_modifier(base, &instruction.scope_modifier, &parent_token);
                match groups.iter_mut().find(|(known, _)| *known == scope) {
                    Some((_, list)) => list.push(instruction),
                    None => groups.push((scope, vec![instruction])),
                }
            }
            if groups.is_empty() {
                groups.push((base, Vec::new()));
            }
            groups
        };

        let passes = groups.into_iter().map(|(scope, instructions)| {
            processing::process_scope(
                Arc::clone(self),
                Arc::clone(coordinator),
                scope,
                instructions,
                None,
                0,
            )
        });
        futures::future::try_join_all(passes).await?;

        coordinator
            .wait_for_sync_state(NavigationState::Completed)
            .await?;
        let mut outcome = Ok(());
        for transition in coordinator.take_transitions() {
            if let Err(err) = transition.await {
                outcome = outcome.and(Err(err));
            }
        }
        outcome?;
        coordinator.finalize(&**self)
    }

    /// Record the committed state in history. Returns the recorded path.
    async fn commit(&self, navigation: &Navigation) -> RouterResult<String> {
        let (path, full_state, titles) = {
            let tree = self.tree.lock();
            let root = tree.root();
            let active = describe::flatten(&tree, tree.active_instructions(root));
            let path = self
                .parser
                .stringify_with(&active, &describe::PathDescriber { tree: &tree }, false);
            (path, self.parser.stringify(&active), describe::titles(&tree, root))
        };

        let hooks = &self.ports.hooks;
        let path = hooks.transform_to_url(path);
        let title = navigation
            .title
            .clone()
            .or_else(|| (!titles.is_empty()).then(|| titles.join(" | ")))
            .map(|title| hooks.transform_title(title));

        let record = NavigationRecord {
            index: 0,
            instruction: navigation.instruction.clone(),
            full_state_instruction: full_state,
            path: path.clone(),
            title,
            query: navigation.query.clone(),
            fragment: navigation.fragment.clone(),
            parameters: navigation.parameters.clone(),
            data: navigation.data.clone(),
            timestamp: navigation.timestamp,
        };
        let replace = navigation.is_history_move()
            || navigation
                .flags
                .intersects(NavigationFlags::REPLACE | NavigationFlags::REFRESH);
        if replace {
            self.ports.history.replace(record).await?;
        } else {
            self.ports.history.push(record).await?;
        }
        *self.last_committed.lock() = Some(navigation.id);
        Ok(path)
    }

    async fn end_cancelled(&self, navigation: &Navigation, reason: String) -> RouterResult<bool> {
        info!(navigation_id = navigation.id, %reason, "Navigation cancelled");
        metrics::record_navigation(router_bus::NavigationOutcome::Cancelled);
        self.publish(RouterEvent::NavigationCancelled {
            navigation_id: navigation.id,
            reason,
        })
        .await;
        self.publish(RouterEvent::NavigationEnded {
            navigation_id: navigation.id,
            outcome: router_bus::NavigationOutcome::Cancelled,
            path: String::new(),
        })
        .await;
        Ok(false)
    }

    async fn end_failed(&self, navigation: &Navigation, err: RouterError) -> RouterResult<bool> {
        error!(navigation_id = navigation.id, error = %err, "Navigation failed");
        metrics::record_navigation(router_bus::NavigationOutcome::Failed);
        self.publish(RouterEvent::NavigationFailed {
            navigation_id: navigation.id,
            error: err.to_string(),
        })
        .await;
        self.publish(RouterEvent::NavigationEnded {
            navigation_id: navigation.id,
            outcome: router_bus::NavigationOutcome::Failed,
            path: String::new(),
        })
        .await;
        Err(err)
    }

    // =========================================================================
    // RETIREMENT
    // =========================================================================

    fn retire_endpoints(&self, removed: Vec<Endpoint>, navigation: NavigationId) {
        let mut retired = self.retired.lock();
        for endpoint in removed {
            let (id, name) = (endpoint.id, endpoint.name().to_string());
            for (component, activated) in endpoint.into_components() {
                let deactivate = activated
                    .then(|| Self::detached_context(id, &name, component.as_ref(), navigation));
                retired.push(Retired::Dispose {
                    component,
                    deactivate,
                });
            }
            retired.push(Retired::Disconnected { endpoint: id, name });
        }
    }

    fn retire_change(
        &self,
        endpoint: EndpointId,
        name: &str,
        change: ContentChange,
        navigation: NavigationId,
        keep_reused: bool,
    ) {
        {
            let mut retired = self.retired.lock();
            for content in change.superseded {
                if keep_reused && content.reuse_instance {
                    continue;
                }
                let Some(component) = content.component else {
                    continue;
                };
                let deactivate = content
                    .states
                    .contains(ContentStates::ACTIVATED)
                    .then(|| Self::detached_context(endpoint, name, component.as_ref(), navigation));
                retired.push(Retired::Dispose {
                    component,
                    deactivate,
                });
            }
        }
        self.retire_endpoints(change.removed, navigation);
    }

    /// Run the component calls queued by commits and rollbacks.
    async fn drain_retired(&self) {
        loop {
            let batch = std::mem::take(&mut *self.retired.lock());
            if batch.is_empty() {
                return;
            }
            for retired in batch {
                match retired {
                    Retired::Dispose {
                        component,
                        deactivate,
                    } => {
                        if let Some(context) = deactivate {
                            if let Err(err) = component.deactivate(&context).await {
                                warn!(component = component.name(), error = %err, "Deactivation failed");
                            }
                        }
                        component.dispose().await;
                    }
                    Retired::Reactivate { component, context } => {
                        if let Err(err) = component.activate(&context).await {
                            warn!(component = component.name(), error = %err, "Reactivation failed");
                        }
                    }
                    Retired::Disconnected { endpoint, name } => {
                        self.publish(RouterEvent::EndpointDisconnected {
                            endpoint_id: endpoint.0,
                            name,
                        })
                        .await;
                    }
                }
            }
        }
    }
}

impl ContentLifecycle for RouterInner {
    fn finalize_content_change(&self, endpoint: EndpointId, navigation: NavigationId) {
        let (change, name) = {
            let mut tree = self.tree.lock();
            let change = tree.finalize_content_change(endpoint, navigation);
            let name = tree
                .endpoint(endpoint)
                .map(|e| e.name().to_string())
                .unwrap_or_default();
            metrics::set_active_endpoints(tree.endpoint_count());
            (change, name)
        };
        self.retire_change(endpoint, &name, change, navigation, false);
    }

    fn cancel_content_change(&self, endpoint: EndpointId, navigation: NavigationId) {
        let (change, name, reactivate) = {
            let mut tree = self.tree.lock();
            let change = tree.cancel_content_change(endpoint, navigation);
            let mut name = String::new();
            let mut reactivate = None;
            if let Some(target) = tree.endpoint_mut(endpoint) {
                name = target.name().to_string();
                if let Some(component) = target.deactivated_component() {
                    target.content_mut().states.insert(ContentStates::ACTIVATED);
                    reactivate = Some(component);
                }
            }
            metrics::set_active_endpoints(tree.endpoint_count());
            (change, name, reactivate)
        };
        self.retire_change(endpoint, &name, change, navigation, true);
        if let Some(component) = reactivate {
            let context = Self::detached_context(endpoint, &name, component.as_ref(), navigation);
            self.retired
                .lock()
                .push(Retired::Reactivate { component, context });
        }
    }
}
