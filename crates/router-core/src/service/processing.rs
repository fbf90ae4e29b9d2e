//! # Scope Processing
//!
//! Fixed point of one routing scope. Each round:
//!
//! 1. queues defaults for empty viewports,
//! 2. matches instructions to endpoints and merges queued instructions,
//! 3. resolves components and offers the new content to each endpoint,
//! 4. spawns a transition per changed endpoint,
//! 5. processes the children of each endpoint once it has loaded.
//!
//! Instructions nothing matched are retried in the next round, since loaded
//! components may have revealed endpoints. Each pass gets its own bound on
//! rounds. Explicit instructions are finite, but defaults can nest without
//! end, so the same bound limits how many defaulted levels a chain of passes
//! may cross.

use super::transition::EndpointTransition;
use super::RouterInner;
use crate::domain::content::{Content, ContentStates};
use crate::domain::coordinator::{NavigationCoordinator, Reservation};
use crate::domain::endpoint::{ContentAction, EndpointId};
use crate::domain::instruction::{InstructionComponent, InstructionEndpoint, InstructionParameters, RoutingInstruction};
use crate::domain::matcher::{match_endpoints, MatchResult, MatchedInstruction};
use crate::domain::navigation::NavigationState;
use crate::domain::scope::ScopeId;
use crate::error::{RouterError, RouterResult};
use crate::ports::outbound::{ComponentFactory, InstanceFactory, RoutableComponent};
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Process `instructions` in `scope` and, recursively, in the scopes below.
///
/// `held` is the reservation that kept late barriers closed until this pass
/// starts discovering. `default_depth` counts the defaulted endpoints above
/// `scope`; it is 0 for the passes a navigation starts.
pub(crate) fn process_scope(
    router: Arc<RouterInner>,
    coordinator: Arc<NavigationCoordinator>,
    scope: ScopeId,
    instructions: Vec<RoutingInstruction>,
    held: Option<Reservation>,
    default_depth: usize,
) -> BoxFuture<'static, RouterResult<()>> {
    async move {
        let clear_unspecified = (router.config.clear_unspecified
            || coordinator.navigation().is_history_move())
            && !instructions.iter().any(RoutingInstruction::is_add);
        let pass = ScopePass {
            router,
            coordinator,
            scope,
            default_depth,
            earlier: Vec::new(),
            clear_unspecified,
        };
        pass.run(instructions, held).await
    }
    .boxed()
}

struct ScopePass {
    router: Arc<RouterInner>,
    coordinator: Arc<NavigationCoordinator>,
    scope: ScopeId,
    default_depth: usize,
    /// Endpoints this pass already gave an instruction.
    earlier: Vec<EndpointId>,
    clear_unspecified: bool,
}

/// An endpoint whose children still need a pass.
struct Descent {
    endpoint: EndpointId,
    /// Set when the endpoint changes content; children wait for `loaded`.
    generation: Option<u64>,
    /// The endpoint's instruction came from a viewport default.
    default: bool,
    scope: ScopeId,
    children: Vec<RoutingInstruction>,
    reservation: Reservation,
}

#[derive(Default)]
struct Resolved {
    factory: Option<Arc<dyn ComponentFactory>>,
    instance: Option<Arc<dyn RoutableComponent>>,
}

impl ScopePass {
    async fn run(
        mut self,
        instructions: Vec<RoutingInstruction>,
        mut held: Option<Reservation>,
    ) -> RouterResult<()> {
        let limit = self.coordinator.max_iterations();
        let mut remaining = instructions;
        let mut rounds = 0;
        loop {
            self.coordinator.check()?;
            // Later rounds only run while instructions are left.
            rounds += 1;
            if rounds > limit {
                return Err(self.coordinator.unresolved(self.scope, &remaining));
            }
            let discovery = self.coordinator.begin_endpoint_discovery();
            drop(held.take());

            let (matched, unmatched, reservations) =
                self.match_round(std::mem::take(&mut remaining), rounds == 1)?;
            if self.default_depth >= limit && matched.iter().any(|m| m.instruction.default) {
                self.coordinator.release_reservations(reservations);
                let nested: Vec<_> = matched
                    .into_iter()
                    .map(|m| m.instruction)
                    .chain(unmatched)
                    .collect();
                warn!(
                    scope = %self.scope,
                    default_depth = self.default_depth,
                    "Viewport defaults nested past the iteration bound"
                );
                return Err(self.coordinator.unresolved(self.scope, &nested));
            }
            let applied = self.apply(matched).await;
            self.coordinator.release_reservations(reservations);
            discovery.final_endpoint();
            let descents = applied?;

            remaining = unmatched;
            let hold = (!remaining.is_empty()).then(|| self.coordinator.reserve());
            self.descend(descents).await?;

            if remaining.is_empty() && !self.coordinator.has_appended(self.scope) {
                return Ok(());
            }
            debug!(
                scope = %self.scope,
                remaining = remaining.len(),
                "Retrying unmatched instructions"
            );
            held = hold;
        }
    }

    // =========================================================================
    // MATCHING
    // =========================================================================

    fn match_round(
        &mut self,
        instructions: Vec<RoutingInstruction>,
        first: bool,
    ) -> RouterResult<(Vec<MatchedInstruction>, Vec<RoutingInstruction>, usize)> {
        let defaults = self.defaults(&instructions, first)?;
        self.coordinator.enqueue_appended(self.scope, defaults);

        let MatchResult {
            mut matched,
            mut remaining,
        } = {
            let mut tree = self.router.tree.lock();
            match_endpoints(
                &mut tree,
                self.scope,
                instructions,
                &self.earlier,
                self.router.config.max_match_iterations,
            )?
        };
        let reservations = self
            .coordinator
            .dequeue_appended(self.scope, &mut matched, &mut remaining);
        if first && self.clear_unspecified {
            self.clear_unspecified(&mut matched);
        }
        Ok((matched, remaining, reservations))
    }

    /// Default instructions for viewports nothing else targets.
    fn defaults(
        &self,
        instructions: &[RoutingInstruction],
        first: bool,
    ) -> RouterResult<Vec<RoutingInstruction>> {
        let tree = self.router.tree.lock();
        let mut defaults = Vec::new();
        for id in tree.endpoints_in(self.scope) {
            if self.earlier.contains(&id) {
                continue;
            }
            let Some(endpoint) = tree.endpoint(id) else {
                continue;
            };
            let Some(default) = endpoint.kind.viewport_options().and_then(|o| o.default.as_deref()) else {
                continue;
            };
            let targeted = instructions.iter().any(|instruction| {
                instruction.endpoint.id() == Some(id)
                    || instruction.endpoint_name() == Some(endpoint.name())
            });
            if targeted {
                continue;
            }

            let parsed = self.router.parser.parse(default)?;
            let relevant = endpoint.relevant_content();
            let shows_default = parsed
                .first()
                .is_some_and(|d| !relevant.is_empty() && relevant.instruction.component_name() == d.component_name());
            let replaces = first && self.clear_unspecified && !shows_default;
            if !relevant.is_empty() && !replaces {
                continue;
            }
            if !self.coordinator.mark_defaulted(id) {
                continue;
            }

            debug!(endpoint = %id, default, "Applying viewport default");
            for (index, mut instruction) in parsed.into_iter().enumerate() {
                instruction.default = true;
                if index == 0 {
                    instruction.bind(id, endpoint.name());
                }
                defaults.push(instruction);
            }
        }
        Ok(defaults)
    }

    /// Clear the viewports of this scope that nothing targeted.
    fn clear_unspecified(&self, matched: &mut Vec<MatchedInstruction>) {
        let tree = self.router.tree.lock();
        for id in tree.endpoints_in(self.scope) {
            if self.earlier.contains(&id) || matched.iter().any(|m| m.endpoint == id) {
                continue;
            }
            let Some(endpoint) = tree.endpoint(id) else {
                continue;
            };
            let keeps = endpoint
                .kind
                .viewport_options()
                .map_or(true, |options| options.default.is_some());
            if keeps || endpoint.relevant_content().is_empty() {
                continue;
            }
            let mut instruction = RoutingInstruction::clear(endpoint.name());
            instruction.bind(id, endpoint.name());
            instruction.scope = Some(self.scope);
            matched.push(MatchedInstruction {
                instruction,
                endpoint: id,
            });
        }
    }

    // =========================================================================
    // APPLYING
    // =========================================================================

    async fn apply(&mut self, matched: Vec<MatchedInstruction>) -> RouterResult<Vec<Descent>> {
        let navigation = Arc::clone(self.coordinator.navigation());
        let mut descents = Vec::new();

        for MatchedInstruction {
            mut instruction,
            endpoint,
        } in matched
        {
            let resolved = self.resolve(&mut instruction, endpoint).await?;
            if instruction.scope.is_none() {
                instruction.scope = Some(self.scope);
            }

            let (action, hosts_component, child_scope) = {
                let mut tree = self.router.tree.lock();
                let id = tree.next_content_id();
                let mut content = Content::new(id, instruction.clone(), navigation.id, resolved.factory);
                if let Some(instance) = resolved.instance {
                    content.component = Some(instance);
                    content.reuse_instance = true;
                    content.states.insert(ContentStates::CREATED);
                }
                let action = tree.set_next_content(endpoint, content, navigation.flags)?;
                let target = tree.require(endpoint)?;
                let child_scope = if instruction.owns_scope {
                    target.scope
                } else {
                    self.scope
                };
                (action, target.is_viewport(), child_scope)
            };
            self.earlier.push(endpoint);

            let generation = (action != ContentAction::Skip).then(|| {
                let generation = self.coordinator.add_endpoint(endpoint);
                let transition = EndpointTransition::new(
                    Arc::clone(&self.router),
                    Arc::clone(&self.coordinator),
                    endpoint,
                    generation,
                    action,
                    hosts_component,
                )
                .spawn();
                self.coordinator.track_transition(endpoint, transition);
                generation
            });

            if instruction.is_clear() {
                continue;
            }
            // A viewport scope hosts nothing; the instruction is routed again
            // inside it.
            let children = if hosts_component {
                instruction.children().to_vec()
            } else {
                let mut inner = instruction.clone();
                inner.endpoint = InstructionEndpoint::None;
                inner.scope = None;
                inner.default = false;
                vec![inner]
            };
            if generation.is_some() || !children.is_empty() || self.clear_unspecified {
                descents.push(Descent {
                    endpoint,
                    generation,
                    default: instruction.default,
                    scope: child_scope,
                    children,
                    reservation: self.coordinator.reserve(),
                });
            }
        }
        Ok(descents)
    }

    /// Find the factory for an instruction's component.
    ///
    /// Names go through the component resolver, then the endpoint's fallback,
    /// then the router's. A fallback receives the unresolved name as its
    /// parameter when the instruction has none.
    async fn resolve(
        &self,
        instruction: &mut RoutingInstruction,
        endpoint: EndpointId,
    ) -> RouterResult<Resolved> {
        let (is_viewport, fallback) = {
            let tree = self.router.tree.lock();
            let target = tree.require(endpoint)?;
            (
                target.is_viewport(),
                target.kind.viewport_options().and_then(|o| o.fallback.clone()),
            )
        };
        if !is_viewport || instruction.is_clear() || instruction.component.is_empty() {
            return Ok(Resolved::default());
        }

        match instruction.component.clone() {
            InstructionComponent::Type(factory) => Ok(Resolved {
                factory: Some(factory),
                instance: None,
            }),
            InstructionComponent::Instance(instance) => {
                let factory: Arc<dyn ComponentFactory> =
                    Arc::new(InstanceFactory::new(Arc::clone(&instance)));
                Ok(Resolved {
                    factory: Some(factory),
                    instance: Some(instance),
                })
            }
            InstructionComponent::Lazy(lazy) => {
                let factory = lazy.load().await?;
                self.coordinator.check()?;
                instruction.component = InstructionComponent::Type(Arc::clone(&factory));
                Ok(Resolved {
                    factory: Some(factory),
                    instance: None,
                })
            }
            InstructionComponent::Name(name) => {
                let components = &self.router.ports.components;
                if let Some(factory) = components.resolve(&name) {
                    return Ok(Resolved {
                        factory: Some(factory),
                        instance: None,
                    });
                }

                let fallback = fallback
                    .or_else(|| self.router.config.fallback.clone())
                    .and_then(|fallback| components.resolve(&fallback));
                if let Some(factory) = fallback {
                    warn!(component = %name, fallback = factory.name(), "Component not found, loading fallback");
                    if instruction.parameters.is_empty() {
                        instruction.parameters = InstructionParameters::List(vec![name]);
                    }
                    instruction.component = InstructionComponent::Type(Arc::clone(&factory));
                    return Ok(Resolved {
                        factory: Some(factory),
                        instance: None,
                    });
                }

                Err(if instruction.route.is_some() {
                    RouterError::ComponentNotFound { name }
                } else {
                    RouterError::UnresolvedConfiguration {
                        segment: name,
                        mode: self.router.config.routing_mode(),
                    }
                })
            }
        }
    }

    // =========================================================================
    // DESCENDING
    // =========================================================================

    async fn descend(&self, descents: Vec<Descent>) -> RouterResult<()> {
        let passes = descents.into_iter().map(|descent| {
            let router = Arc::clone(&self.router);
            let coordinator = Arc::clone(&self.coordinator);
            let default_depth = self.default_depth + usize::from(descent.default);
            async move {
                if let Some(generation) = descent.generation {
                    let loaded = coordinator
                        .wait_for_entity_state(descent.endpoint, generation, NavigationState::Loaded)
                        .await?;
                    if !loaded {
                        // Redirected or superseded; the new content has its own pass.
                        return Ok(());
                    }
                }
                process_scope(
                    router,
                    coordinator,
                    descent.scope,
                    descent.children,
                    Some(descent.reservation),
                    default_depth,
                )
                .await
            }
        });
        future::try_join_all(passes).await.map(|_| ())
    }
}
