//! # Navigation Coordinator
//!
//! Cross-endpoint synchronisation of one in-flight navigation.
//!
//! Every endpoint changing content joins as an entity and reports the
//! checkpoints it reaches. A sync-state barrier opens when:
//!
//! - every current entity has reached the state,
//! - no scope is still discovering endpoints (`final_endpoint` was called for
//!   every `begin_endpoint_discovery`),
//! - for states after `loaded`, no reservation is held. Reservations stand for
//!   work that may still add entities: pending child scope passes, unmatched
//!   instructions and queued redirects. States up to `loaded` ignore them,
//!   because the child passes they stand for wait for their parent's `loaded`.
//!
//! Waiters poll a `watch` version that every state change bumps.

use crate::domain::matcher::{describe, MatchedInstruction};
use crate::domain::endpoint::EndpointId;
use crate::domain::instruction::RoutingInstruction;
use crate::domain::navigation::{Navigation, NavigationId, NavigationOutcome, NavigationState};
use crate::domain::scope::ScopeId;
use crate::error::{RouterError, RouterResult};
use crate::scheduler::SpawnedStep;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Commit and rollback of endpoint contents, implemented by the router.
pub trait ContentLifecycle: Send + Sync {
    fn finalize_content_change(&self, endpoint: EndpointId, navigation: NavigationId);
    fn cancel_content_change(&self, endpoint: EndpointId, navigation: NavigationId);
}

#[derive(Debug)]
struct Entity {
    endpoint: EndpointId,
    generation: u64,
    states: BTreeSet<NavigationState>,
}

#[derive(Debug)]
struct Appended {
    scope: ScopeId,
    instruction: RoutingInstruction,
    reserved: bool,
}

#[derive(Default)]
struct CoordinatorState {
    entities: Vec<Entity>,
    discoveries: usize,
    reservations: usize,
    appended: Vec<Appended>,
    transitions: Vec<(EndpointId, SpawnedStep<NavigationState>)>,
    cancelled: bool,
    failure: Option<RouterError>,
    cancel_reason: Option<String>,
    finalized: bool,
    next_generation: u64,
    defaulted: HashSet<EndpointId>,
}

impl CoordinatorState {
    fn barrier_open(&self, state: NavigationState) -> bool {
        self.discoveries == 0
            && (state <= NavigationState::Loaded || self.reservations == 0)
            && self.entities.iter().all(|entity| entity.states.contains(&state))
    }

    fn entity(&self, endpoint: EndpointId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.endpoint == endpoint)
    }

    fn stopped(&self) -> Option<RouterError> {
        self.cancelled
            .then(|| self.failure.clone().unwrap_or(RouterError::Cancelled))
    }
}

/// Coordinator of one navigation. Always held in an `Arc`.
pub struct NavigationCoordinator {
    navigation: Arc<Navigation>,
    sync_states: BTreeSet<NavigationState>,
    max_iterations: usize,
    inner: Mutex<CoordinatorState>,
    version: watch::Sender<u64>,
}

impl NavigationCoordinator {
    pub fn new(
        navigation: Arc<Navigation>,
        sync_states: BTreeSet<NavigationState>,
        max_iterations: usize,
    ) -> Arc<Self> {
        let (version, _) = watch::channel(0);
        Arc::new(Self {
            navigation,
            sync_states,
            max_iterations,
            inner: Mutex::new(CoordinatorState::default()),
            version,
        })
    }

    pub fn navigation(&self) -> &Arc<Navigation> {
        &self.navigation
    }

    pub fn is_sync_state(&self, state: NavigationState) -> bool {
        self.sync_states.contains(&state)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    pub fn failure(&self) -> Option<RouterError> {
        self.inner.lock().failure.clone()
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.inner.lock().cancel_reason.clone()
    }

    /// Error to surface when the navigation stopped, if it did.
    pub fn check(&self) -> RouterResult<()> {
        match self.inner.lock().stopped() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    // =========================================================================
    // DISCOVERY AND RESERVATIONS
    // =========================================================================

    /// A scope starts matching; barriers stay closed until the guard is
    /// dropped or [`DiscoveryGuard::final_endpoint`] is called.
    pub fn begin_endpoint_discovery(self: &Arc<Self>) -> DiscoveryGuard {
        self.inner.lock().discoveries += 1;
        DiscoveryGuard {
            coordinator: Some(self.clone()),
        }
    }

    /// No more endpoints will join from one discovering scope.
    pub fn final_endpoint(&self) {
        {
            let mut state = self.inner.lock();
            state.discoveries = state.discoveries.saturating_sub(1);
        }
        self.bump();
    }

    /// Hold barriers after `loaded` closed for pending work.
    pub fn reserve(self: &Arc<Self>) -> Reservation {
        self.inner.lock().reservations += 1;
        Reservation {
            coordinator: Some(self.clone()),
        }
    }

    /// Release reservations held by dequeued instructions.
    pub fn release_reservations(&self, count: usize) {
        if count == 0 {
            return;
        }
        {
            let mut state = self.inner.lock();
            state.reservations = state.reservations.saturating_sub(count);
        }
        self.bump();
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Admit an endpoint. Returns the entity generation; re-adding an
    /// endpoint starts a new generation from scratch.
    pub fn add_endpoint(&self, endpoint: EndpointId) -> u64 {
        let generation = {
            let mut state = self.inner.lock();
            let reclosed = self
                .sync_states
                .iter()
                .filter(|sync| state.barrier_open(**sync))
                .count();

            state.entities.retain(|entity| entity.endpoint != endpoint);
            state.next_generation += 1;
            let generation = state.next_generation;
            state.entities.push(Entity {
                endpoint,
                generation,
                states: BTreeSet::new(),
            });
            if reclosed > 0 {
                debug!(
                    navigation_id = self.navigation.id,
                    %endpoint,
                    reclosed,
                    "Barriers re-closed by late endpoint"
                );
            }
            generation
        };
        self.bump();
        generation
    }

    pub fn remove_endpoint(&self, endpoint: EndpointId) {
        self.inner
            .lock()
            .entities
            .retain(|entity| entity.endpoint != endpoint);
        self.bump();
    }

    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.inner.lock().entities.iter().map(|e| e.endpoint).collect()
    }

    /// Record that an entity reached `state` (and every state before it).
    /// Returns `false` for a removed or superseded entity.
    pub fn add_state(&self, endpoint: EndpointId, generation: u64, state: NavigationState) -> bool {
        let found = {
            let mut inner = self.inner.lock();
            match inner
                .entities
                .iter_mut()
                .find(|e| e.endpoint == endpoint && e.generation == generation)
            {
                Some(entity) => {
                    entity.states.extend(state.up_to());
                    true
                }
                None => false,
            }
        };
        if found {
            debug!(navigation_id = self.navigation.id, %endpoint, %state, "Endpoint state reached");
            self.bump();
        }
        found
    }

    pub fn has_reached(&self, endpoint: EndpointId, state: NavigationState) -> bool {
        self.inner
            .lock()
            .entity(endpoint)
            .is_some_and(|entity| entity.states.contains(&state))
    }

    pub fn barrier_open(&self, state: NavigationState) -> bool {
        self.inner.lock().barrier_open(state)
    }

    // =========================================================================
    // WAITING
    // =========================================================================

    async fn wait_until<R>(
        &self,
        mut ready: impl FnMut(&CoordinatorState) -> Option<R>,
    ) -> RouterResult<R> {
        let mut receiver = self.version.subscribe();
        loop {
            receiver.borrow_and_update();
            {
                let state = self.inner.lock();
                if let Some(err) = state.stopped() {
                    return Err(err);
                }
                if let Some(result) = ready(&*state) {
                    return Ok(result);
                }
            }
            if receiver.changed().await.is_err() {
                return Err(RouterError::Cancelled);
            }
        }
    }

    /// Suspend until the barrier of `state` opens. Returns at once for
    /// states that are not sync states.
    pub async fn wait_for_sync_state(&self, state: NavigationState) -> RouterResult<()> {
        if !self.is_sync_state(state) {
            return self.check();
        }
        self.wait_until(|inner| inner.barrier_open(state).then_some(()))
            .await
    }

    /// Suspend until `endpoint` reached `state`. `false` when the endpoint is
    /// not (or no longer) part of the navigation.
    pub async fn wait_for_endpoint_state(
        &self,
        endpoint: EndpointId,
        state: NavigationState,
    ) -> RouterResult<bool> {
        self.wait_until(|inner| match inner.entity(endpoint) {
            Some(entity) if entity.states.contains(&state) => Some(true),
            Some(_) => None,
            None => Some(false),
        })
        .await
    }

    /// Like [`wait_for_endpoint_state`](Self::wait_for_endpoint_state) for one
    /// generation of the entity; `false` once it was removed or re-added.
    pub async fn wait_for_entity_state(
        &self,
        endpoint: EndpointId,
        generation: u64,
        state: NavigationState,
    ) -> RouterResult<bool> {
        self.wait_until(|inner| match inner.entity(endpoint) {
            Some(entity) if entity.generation != generation => Some(false),
            Some(entity) if entity.states.contains(&state) => Some(true),
            Some(_) => None,
            None => Some(false),
        })
        .await
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Track a spawned transition so cancellation reaches it.
    pub fn track_transition(&self, endpoint: EndpointId, transition: SpawnedStep<NavigationState>) {
        let mut state = self.inner.lock();
        if state.cancelled {
            transition.cancel();
        }
        state.transitions.push((endpoint, transition));
    }

    pub fn take_transitions(&self) -> Vec<SpawnedStep<NavigationState>> {
        std::mem::take(&mut self.inner.lock().transitions)
            .into_iter()
            .map(|(_, transition)| transition)
            .collect()
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    /// Stop the navigation and roll back every entity. Runs once; settles the
    /// completion as cancelled, or failed when a failure was recorded.
    pub fn cancel(&self, lifecycle: &dyn ContentLifecycle, reason: impl Into<String>) {
        let entities = {
            let mut state = self.inner.lock();
            if state.cancelled || state.finalized {
                return;
            }
            state.cancelled = true;
            state.cancel_reason.get_or_insert_with(|| reason.into());
            for (_, transition) in &state.transitions {
                transition.cancel();
            }
            state.entities.iter().map(|e| e.endpoint).collect::<Vec<_>>()
        };

        for endpoint in entities.iter().rev() {
            lifecycle.cancel_content_change(*endpoint, self.navigation.id);
        }
        let outcome = match self.failure() {
            Some(err) => NavigationOutcome::Failed(err),
            None => NavigationOutcome::Cancelled,
        };
        info!(
            navigation_id = self.navigation.id,
            rolled_back = entities.len(),
            reason = ?self.cancel_reason(),
            "Navigation cancelled"
        );
        self.navigation.completion.settle(outcome);
        self.bump();
    }

    /// Record the first failure and cancel.
    pub fn fail(&self, err: RouterError, lifecycle: &dyn ContentLifecycle) {
        if err.is_cancelled() {
            self.cancel(lifecycle, "cancelled");
            return;
        }
        {
            let mut state = self.inner.lock();
            if state.cancelled || state.finalized {
                return;
            }
            state.failure.get_or_insert_with(|| err.clone());
        }
        error!(navigation_id = self.navigation.id, error = %err, "Navigation failed");
        self.cancel(lifecycle, err.to_string());
    }

    /// Commit every entity's content and settle the navigation as committed.
    pub fn finalize(&self, lifecycle: &dyn ContentLifecycle) -> RouterResult<()> {
        let entities = {
            let mut state = self.inner.lock();
            if let Some(err) = state.stopped() {
                return Err(err);
            }
            if state.finalized {
                return Ok(());
            }
            state.finalized = true;
            state.entities.iter().map(|e| e.endpoint).collect::<Vec<_>>()
        };
        for endpoint in &entities {
            lifecycle.finalize_content_change(*endpoint, self.navigation.id);
        }
        self.navigation.completion.settle(NavigationOutcome::Committed);
        self.bump();
        Ok(())
    }

    // =========================================================================
    // APPENDED INSTRUCTIONS
    // =========================================================================

    /// Queue instructions discovered while processing, for `scope`.
    pub fn enqueue_appended(&self, scope: ScopeId, instructions: Vec<RoutingInstruction>) {
        if instructions.is_empty() {
            return;
        }
        {
            let mut state = self.inner.lock();
            state.appended.extend(instructions.into_iter().map(|instruction| Appended {
                scope,
                instruction,
                reserved: false,
            }));
        }
        self.bump();
    }

    /// Re-dispatch `endpoint` to `instructions`. The endpoint leaves the
    /// navigation; the first instruction is bound to it and a reservation
    /// holds late barriers until the redirect is dequeued.
    pub fn enqueue_redirect(
        &self,
        endpoint: EndpointId,
        name: &str,
        scope: ScopeId,
        instructions: Vec<RoutingInstruction>,
    ) {
        {
            let mut state = self.inner.lock();
            state.reservations += 1;
            let mut reserved = true;
            for (index, mut instruction) in instructions.into_iter().enumerate() {
                if index == 0 {
                    instruction.bind(endpoint, name);
                }
                state.appended.push(Appended {
                    scope,
                    instruction,
                    reserved: std::mem::take(&mut reserved),
                });
            }
            if reserved {
                // Nothing was queued to carry the reservation.
                state.reservations -= 1;
            }
            state.entities.retain(|entity| entity.endpoint != endpoint);
        }
        info!(navigation_id = self.navigation.id, %endpoint, "Endpoint redirected");
        self.bump();
    }

    pub fn has_appended(&self, scope: ScopeId) -> bool {
        self.inner.lock().appended.iter().any(|a| a.scope == scope)
    }

    /// Merge the instructions queued for `scope` into a match result.
    ///
    /// Non-default instructions go first and replace a match for the same
    /// endpoint; default instructions are dropped when the endpoint already
    /// has one. Unbound instructions join `remaining`. Returns the number of
    /// reservations the caller must release once the instructions are applied.
    pub fn dequeue_appended(
        &self,
        scope: ScopeId,
        matched: &mut Vec<MatchedInstruction>,
        remaining: &mut Vec<RoutingInstruction>,
    ) -> usize {
        let mut entries: Vec<Appended> = {
            let mut state = self.inner.lock();
            let (mine, others): (Vec<Appended>, Vec<Appended>) = std::mem::take(&mut state.appended)
                .into_iter()
                .partition(|a| a.scope == scope);
            state.appended = others;
            mine
        };
        entries.sort_by_key(|entry| entry.instruction.default);

        let mut reservations = 0;
        for entry in entries {
            if entry.reserved {
                reservations += 1;
            }
            let mut instruction = entry.instruction;
            let Some(endpoint) = instruction.endpoint.id() else {
                remaining.push(instruction);
                continue;
            };
            if instruction.default {
                if matched.iter().any(|m| m.endpoint == endpoint) {
                    continue;
                }
            } else {
                matched.retain(|m| m.endpoint != endpoint);
            }
            instruction.scope = Some(scope);
            matched.push(MatchedInstruction {
                instruction,
                endpoint,
            });
        }
        reservations
    }

    /// Whether the default of `endpoint` may still be applied.
    pub fn mark_defaulted(&self, endpoint: EndpointId) -> bool {
        self.inner.lock().defaulted.insert(endpoint)
    }

    /// Rounds one scope pass may take, and how many defaults may nest.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Exhaustion error for a pass over `scope` that gave up with
    /// `remaining` unrouted. Instructions still queued for the scope are
    /// reported too.
    pub fn unresolved(&self, scope: ScopeId, remaining: &[RoutingInstruction]) -> RouterError {
        let state = self.inner.lock();
        let queued = state
            .appended
            .iter()
            .filter(|a| a.scope == scope)
            .map(|a| &a.instruction);
        RouterError::UnresolvedInstructions {
            iterations: self.max_iterations,
            remaining: remaining.iter().chain(queued).map(describe).collect(),
        }
    }
}

/// Discovery in progress for one scope pass.
pub struct DiscoveryGuard {
    coordinator: Option<Arc<NavigationCoordinator>>,
}

impl DiscoveryGuard {
    pub fn final_endpoint(mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.final_endpoint();
        }
    }
}

impl Drop for DiscoveryGuard {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.final_endpoint();
        }
    }
}

/// A held reservation; released on drop.
pub struct Reservation {
    coordinator: Option<Arc<NavigationCoordinator>>,
}

impl Reservation {
    pub fn release(mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.release_reservations(1);
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.release_reservations(1);
        }
    }
}
