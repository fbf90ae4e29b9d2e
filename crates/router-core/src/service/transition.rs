//! # Endpoint Transitions
//!
//! One step chain per endpoint changing content:
//!
//! ```text
//!  guard unload ──► guard load ──► unload ──► load ──► swap
//!       │               │            │         │        │
//!  guardedUnload    guardedLoad   unloaded   loaded   swapped ──► completed
//!                    guarded                 routed
//! ```
//!
//! Every checkpoint is reported to the coordinator. At sync states the chain
//! suspends until the barrier opens. Viewport scopes host no component, so
//! their chain only reports.

use super::RouterInner;
use crate::domain::content::ContentStates;
use crate::domain::coordinator::{ContentLifecycle, NavigationCoordinator};
use crate::domain::endpoint::{ContentAction, EndpointId};
use crate::domain::navigation::NavigationState;
use crate::domain::scope::ScopeId;
use crate::error::{RouterError, RouterResult};
use crate::hooks::LifecycleHookKind;
use crate::metrics;
use crate::ports::outbound::GuardOutcome;
use crate::scheduler::{Runner, SpawnedStep, Step, StepOutput};
use futures::FutureExt;
use router_bus::RouterEvent;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

type StageResult = RouterResult<StepOutput<NavigationState>>;

pub(crate) struct EndpointTransition {
    router: Arc<RouterInner>,
    coordinator: Arc<NavigationCoordinator>,
    endpoint: EndpointId,
    generation: u64,
    action: ContentAction,
    hosts_component: bool,
}

impl EndpointTransition {
    pub(crate) fn new(
        router: Arc<RouterInner>,
        coordinator: Arc<NavigationCoordinator>,
        endpoint: EndpointId,
        generation: u64,
        action: ContentAction,
        hosts_component: bool,
    ) -> Self {
        Self {
            router,
            coordinator,
            endpoint,
            generation,
            action,
            hosts_component,
        }
    }

    /// Start the chain on its own task. A failure other than cancellation
    /// fails the whole navigation.
    pub(crate) fn spawn(self) -> SpawnedStep<NavigationState> {
        let router = Arc::clone(&self.router);
        let coordinator = Arc::clone(&self.coordinator);
        let endpoint = self.endpoint;
        let steps = Arc::new(self).steps();
        Runner::run(steps).spawn_with(move |result| {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!(%endpoint, error = %err, "Endpoint transition failed");
                    coordinator.fail(err.clone(), &*router);
                }
            }
        })
    }

    fn steps(self: Arc<Self>) -> Vec<Step<NavigationState>> {
        use NavigationState::*;

        let mut steps = Vec::new();
        if self.hosts_component {
            steps.push(self.stage(Self::guard_unload));
        }
        steps.push(self.report(GuardedUnload));
        if self.hosts_component {
            steps.push(self.stage(Self::guard_load));
        }
        steps.push(self.report(GuardedLoad));
        steps.push(self.report(Guarded));
        if self.hosts_component {
            steps.push(self.stage(Self::unload));
        }
        steps.push(self.report(Unloaded));
        if self.hosts_component {
            steps.push(self.stage(Self::load));
        }
        steps.push(self.report(Loaded));
        steps.push(self.report(Routed));
        if self.hosts_component {
            steps.push(self.swap());
        }
        steps.push(self.report(Swapped));
        steps.push(self.report(Completed));
        steps
    }

    fn stage<F, Fut>(self: &Arc<Self>, f: F) -> Step<NavigationState>
    where
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = StageResult> + Send + 'static,
    {
        let this = Arc::clone(self);
        Step::run(move |_| StepOutput::Pending(f(this).boxed()))
    }

    /// Report `state`, then wait for its barrier when it is a sync state.
    /// A superseded generation ends the chain quietly.
    fn report(self: &Arc<Self>, state: NavigationState) -> Step<NavigationState> {
        self.stage(move |this| async move {
            if !this.coordinator.add_state(this.endpoint, this.generation, state) {
                return Ok(StepOutput::Exit(state));
            }
            if state == NavigationState::Completed {
                metrics::record_transition();
            }
            this.coordinator.wait_for_sync_state(state).await?;
            Ok(StepOutput::Value(state))
        })
    }

    fn swap(self: &Arc<Self>) -> Step<NavigationState> {
        if self.action == ContentAction::Reload {
            return self.stage(Self::keep_active);
        }
        let detach = self.stage(Self::detach);
        let attach = self.stage(Self::attach);
        let order = self.router.config.swap_order;
        let pair = if order.attach_first() {
            vec![attach, detach]
        } else {
            vec![detach, attach]
        };
        if order.is_simultaneous() {
            Step::Parallel(pair)
        } else {
            Step::Sequence(pair)
        }
    }

    fn reject(&self, guard: &str, reason: String) -> StageResult {
        metrics::record_guard_rejection(guard);
        info!(
            navigation_id = self.coordinator.navigation().id,
            endpoint = %self.endpoint,
            guard,
            %reason,
            "Guard rejected navigation"
        );
        self.coordinator.cancel(&*self.router, reason);
        Err(RouterError::Cancelled)
    }

    // =========================================================================
    // GUARDS
    // =========================================================================

    /// Ask the active component, and everything below it, to unload.
    async fn guard_unload(self: Arc<Self>) -> StageResult {
        let navigation = Arc::clone(self.coordinator.navigation());
        let checks = {
            let mut tree = self.router.tree.lock();
            let mut targets = tree.active_descendants(self.endpoint);
            targets.push(self.endpoint);

            let mut checks = Vec::new();
            for id in targets {
                let Some(endpoint) = tree.endpoint(id) else {
                    continue;
                };
                let content = endpoint.content();
                let Some(component) = content.component.clone() else {
                    continue;
                };
                if content.is_empty() {
                    continue;
                }
                let context = self.router.context(&tree, endpoint, content, &navigation);
                let Some(endpoint) = tree.endpoint_mut(id) else {
                    continue;
                };
                let content = endpoint.content_mut();
                content.reset_guards_for(navigation.id);
                checks.push((id, content.guards(), component, context));
            }
            checks
        };

        let hooks = &self.router.ports.hooks;
        for (id, guards, component, context) in checks {
            let (component_ref, context_ref) = (&component, &context);
            let allowed = guards
                .can_unload(move || async move {
                    let outcome = hooks
                        .run_lifecycle(LifecycleHookKind::CanUnload, context_ref)
                        .await?;
                    if !outcome.is_allowed() {
                        return Ok(false);
                    }
                    component_ref.can_unload(context_ref).await
                })
                .await?;
            self.coordinator.check()?;
            if !allowed {
                return self.reject(
                    LifecycleHookKind::CanUnload.as_str(),
                    format!("{} refused to unload from {}", context.component, context.endpoint_name),
                );
            }
            if let Some(endpoint) = self.router.tree.lock().endpoint_mut(id) {
                endpoint.content_mut().states.insert(ContentStates::CHECKED_UNLOAD);
            }
        }
        Ok(StepOutput::Empty)
    }

    /// Create the pending component and ask it whether it may load.
    async fn guard_load(self: Arc<Self>) -> StageResult {
        let navigation = Arc::clone(self.coordinator.navigation());
        let (guards, component, context, scope, name) = {
            let mut tree = self.router.tree.lock();
            let endpoint = tree.require(self.endpoint)?;
            let content = endpoint.content_for(navigation.id).ok_or(RouterError::Cancelled)?;
            if content.is_empty() {
                return Ok(StepOutput::Empty);
            }
            let context = self.router.context(&tree, endpoint, content, &navigation);
            let name = endpoint.name().to_string();
            let scope: ScopeId = content.instruction.scope.unwrap_or(endpoint.parent_scope);

            let content = tree
                .require_mut(self.endpoint)?
                .content_for_mut(navigation.id)
                .ok_or(RouterError::Cancelled)?;
            let component = match &content.component {
                Some(component) => Arc::clone(component),
                None => {
                    let factory = content.factory.clone().ok_or_else(|| {
                        RouterError::ComponentNotFound {
                            name: content.component_name().to_string(),
                        }
                    })?;
                    let created = factory.create()?;
                    content.component = Some(Arc::clone(&created));
                    content.states.insert(ContentStates::CREATED);
                    created
                }
            };
            (content.guards(), component, context, scope, name)
        };

        let hooks = &self.router.ports.hooks;
        let (component_ref, context_ref) = (&component, &context);
        let outcome = guards
            .can_load(move || async move {
                let outcome = hooks
                    .run_lifecycle(LifecycleHookKind::CanLoad, context_ref)
                    .await?;
                if !outcome.is_allowed() {
                    return Ok(outcome);
                }
                component_ref.can_load(context_ref).await
            })
            .await?;
        self.coordinator.check()?;

        match outcome {
            GuardOutcome::Allow => {
                let mut tree = self.router.tree.lock();
                if let Some(content) = tree
                    .endpoint_mut(self.endpoint)
                    .and_then(|endpoint| endpoint.content_for_mut(navigation.id))
                {
                    content.states.insert(ContentStates::CHECKED_LOAD);
                }
                Ok(StepOutput::Empty)
            }
            GuardOutcome::Deny => self.reject(
                LifecycleHookKind::CanLoad.as_str(),
                format!("{} refused to load in {}", context.component, context.endpoint_name),
            ),
            GuardOutcome::Redirect(target) => self.redirect(&name, scope, &target.0),
        }
    }

    /// Drop the pending content and re-dispatch this endpoint to `target`.
    fn redirect(&self, name: &str, scope: ScopeId, target: &str) -> StageResult {
        let instructions = self.router.parser.parse(target)?;
        let navigation = self.coordinator.navigation().id;
        info!(navigation_id = navigation, endpoint = %self.endpoint, target, "Guard redirected endpoint");
        self.router.cancel_content_change(self.endpoint, navigation);
        self.coordinator
            .enqueue_redirect(self.endpoint, name, scope, instructions);
        Ok(StepOutput::Exit(NavigationState::GuardedLoad))
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Unload the active component, deepest descendants first.
    async fn unload(self: Arc<Self>) -> StageResult {
        let navigation = Arc::clone(self.coordinator.navigation());
        let targets: Vec<_> = {
            let tree = self.router.tree.lock();
            let mut ids = tree.active_descendants(self.endpoint);
            ids.push(self.endpoint);
            ids.into_iter()
                .filter_map(|id| {
                    let endpoint = tree.endpoint(id)?;
                    let content = endpoint.content();
                    if content.is_empty() || content.states.contains(ContentStates::UNLOADED) {
                        return None;
                    }
                    let component = content.component.clone()?;
                    Some((id, component, self.router.context(&tree, endpoint, content, &navigation)))
                })
                .collect()
        };

        for (id, component, context) in targets {
            let outcome = self
                .router
                .ports
                .hooks
                .run_lifecycle(LifecycleHookKind::Unloading, &context)
                .await?;
            if !outcome.is_allowed() {
                return self.reject(
                    LifecycleHookKind::Unloading.as_str(),
                    format!("unloading of {} was stopped", context.component),
                );
            }
            component.unloading(&context).await?;
            self.coordinator.check()?;
            if let Some(endpoint) = self.router.tree.lock().endpoint_mut(id) {
                endpoint.content_mut().states.insert(ContentStates::UNLOADED);
            }
        }
        Ok(StepOutput::Empty)
    }

    /// Load the pending component and connect the endpoints it declares.
    async fn load(self: Arc<Self>) -> StageResult {
        let navigation = Arc::clone(self.coordinator.navigation());
        let (component, context, content_id, scope) = {
            let tree = self.router.tree.lock();
            let endpoint = tree.require(self.endpoint)?;
            let content = endpoint.content_for(navigation.id).ok_or(RouterError::Cancelled)?;
            if content.is_empty() {
                return Ok(StepOutput::Empty);
            }
            let component = content
                .component
                .clone()
                .ok_or_else(|| RouterError::internal("component missing after guards"))?;
            let context = self.router.context(&tree, endpoint, content, &navigation);
            (component, context, content.id, endpoint.scope)
        };

        let outcome = self
            .router
            .ports
            .hooks
            .run_lifecycle(LifecycleHookKind::Loading, &context)
            .await?;
        if !outcome.is_allowed() {
            return self.reject(
                LifecycleHookKind::Loading.as_str(),
                format!("loading of {} was stopped", context.component),
            );
        }
        component.loading(&context).await?;
        self.coordinator.check()?;

        let declarations = component.endpoints();
        let connected = {
            let mut tree = self.router.tree.lock();
            // Rolled back while loading: the owner is gone.
            if tree
                .endpoint(self.endpoint)
                .and_then(|endpoint| endpoint.content_for(navigation.id))
                .is_none()
            {
                return Err(RouterError::Cancelled);
            }
            let mut connected = Vec::new();
            for declaration in declarations {
                for id in tree.connect_endpoint(scope, Some(content_id), declaration)? {
                    if let Some(endpoint) = tree.endpoint(id) {
                        connected.push((id, endpoint.name().to_string()));
                    }
                }
            }
            if let Some(content) = tree
                .endpoint_mut(self.endpoint)
                .and_then(|endpoint| endpoint.content_for_mut(navigation.id))
            {
                content.states.insert(ContentStates::LOADED);
            }
            metrics::set_active_endpoints(tree.endpoint_count());
            connected
        };

        for (id, name) in connected {
            self.router
                .publish(RouterEvent::EndpointConnected {
                    endpoint_id: id.0,
                    name,
                })
                .await;
        }
        Ok(StepOutput::Empty)
    }

    // =========================================================================
    // SWAP
    // =========================================================================

    async fn detach(self: Arc<Self>) -> StageResult {
        self.coordinator.check()?;
        let navigation = Arc::clone(self.coordinator.navigation());
        let target = {
            let tree = self.router.tree.lock();
            let endpoint = tree.require(self.endpoint)?;
            let content = endpoint.content();
            match &content.component {
                Some(component) if content.states.contains(ContentStates::ACTIVATED) => Some((
                    Arc::clone(component),
                    self.router.context(&tree, endpoint, content, &navigation),
                )),
                _ => None,
            }
        };
        let Some((component, context)) = target else {
            return Ok(StepOutput::Empty);
        };

        component.deactivate(&context).await?;
        let rolled_back = {
            let mut tree = self.router.tree.lock();
            // A rollback that ran while deactivating saw the component still
            // attached and left it alone, so the flag stays and it is
            // attached again here.
            let rolled_back = self.coordinator.is_cancelled();
            if !rolled_back {
                if let Some(endpoint) = tree.endpoint_mut(self.endpoint) {
                    endpoint.content_mut().states.remove(ContentStates::ACTIVATED);
                }
            }
            rolled_back
        };
        if rolled_back {
            info!(endpoint = %self.endpoint, component = %context.component, "Reattaching component after rollback");
            component.activate(&context).await?;
            return Err(RouterError::Cancelled);
        }
        Ok(StepOutput::Empty)
    }

    async fn attach(self: Arc<Self>) -> StageResult {
        self.coordinator.check()?;
        let navigation = Arc::clone(self.coordinator.navigation());
        let target = {
            let mut tree = self.router.tree.lock();
            let endpoint = tree.require(self.endpoint)?;
            let content = endpoint.content_for(navigation.id).ok_or(RouterError::Cancelled)?;
            let target = content
                .component
                .clone()
                .filter(|_| !content.is_empty())
                .map(|component| (component, self.router.context(&tree, endpoint, content, &navigation)));
            if target.is_some() {
                if let Some(content) = tree
                    .endpoint_mut(self.endpoint)
                    .and_then(|endpoint| endpoint.content_for_mut(navigation.id))
                {
                    content.states.insert(ContentStates::ACTIVATING);
                }
            }
            target
        };
        let Some((component, context)) = target else {
            return Ok(StepOutput::Empty);
        };

        component.activate(&context).await?;
        let attached = {
            let mut tree = self.router.tree.lock();
            match tree
                .endpoint_mut(self.endpoint)
                .and_then(|endpoint| endpoint.content_for_mut(navigation.id))
            {
                Some(content) => {
                    content.states.remove(ContentStates::ACTIVATING);
                    content.states.insert(ContentStates::ACTIVATED);
                    true
                }
                None => false,
            }
        };
        if !attached {
            // Rolled back while activating; the rollback did not see it attached.
            component.deactivate(&context).await?;
            return Err(RouterError::Cancelled);
        }
        Ok(StepOutput::Empty)
    }

    /// A reloaded component stays attached.
    async fn keep_active(self: Arc<Self>) -> StageResult {
        let navigation = self.coordinator.navigation().id;
        let mut tree = self.router.tree.lock();
        if let Some(content) = tree
            .endpoint_mut(self.endpoint)
            .and_then(|endpoint| endpoint.content_for_mut(navigation))
        {
            content.states.insert(ContentStates::ACTIVATED);
        }
        Ok(StepOutput::Empty)
    }
}
