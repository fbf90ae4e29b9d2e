//! # Endpoint Matcher
//!
//! Assigns instructions to endpoints of one scope through ordered passes,
//! each removing what it matched from the working set:
//!
//! 1. instructions bound to a live endpoint
//! 2. segments caught by a viewport scope (collections grow an item)
//! 3. viewports declaring affinity (`used_by`) for the component
//! 4. viewports addressed by name
//! 5. the sole remaining compatible viewport
//!
//! The passes repeat while they make progress, since growing a collection
//! reveals new endpoints. What is left is returned as remaining; the caller
//! retries after applying the matched instructions.

use crate::domain::endpoint::{EndpointId, EndpointKind};
use crate::domain::instruction::{InstructionEndpoint, RoutingInstruction};
use crate::domain::scope::{RouterTree, ScopeId};
use crate::error::{RouterError, RouterResult};
use tracing::{debug, trace};

/// An instruction assigned to an endpoint.
#[derive(Debug, Clone)]
pub struct MatchedInstruction {
    pub instruction: RoutingInstruction,
    pub endpoint: EndpointId,
}

/// Outcome of one matcher run.
#[derive(Debug, Default)]
pub struct MatchResult {
    pub matched: Vec<MatchedInstruction>,
    pub remaining: Vec<RoutingInstruction>,
}

/// Short textual form used in diagnostics.
pub fn describe(instruction: &RoutingInstruction) -> String {
    match instruction.endpoint_name() {
        Some(endpoint) => format!("{}@{endpoint}", instruction.component_name()),
        None => instruction.component_name().to_string(),
    }
}

struct Pass<'a> {
    tree: &'a mut RouterTree,
    scope: ScopeId,
    used: Vec<EndpointId>,
    matched: Vec<MatchedInstruction>,
}

impl Pass<'_> {
    fn available(&self) -> Vec<EndpointId> {
        self.tree
            .endpoints_in(self.scope)
            .into_iter()
            .filter(|id| !self.used.contains(id))
            .collect()
    }

    fn assign(&mut self, mut instruction: RoutingInstruction, endpoint: EndpointId) {
        let name = self
            .tree
            .endpoint(endpoint)
            .map(|e| e.name().to_string())
            .unwrap_or_default();
        trace!(instruction = %describe(&instruction), %endpoint, "Instruction matched");
        instruction.bind(endpoint, name);
        instruction.scope = Some(self.scope);
        self.used.push(endpoint);
        self.matched.push(MatchedInstruction {
            instruction,
            endpoint,
        });
    }

    fn bound(&mut self, instructions: Vec<RoutingInstruction>) -> Vec<RoutingInstruction> {
        let mut remaining = Vec::new();
        for mut instruction in instructions {
            match instruction.endpoint.id() {
                Some(id) if self.tree.endpoint(id).is_some() => {
                    self.used.retain(|used| *used != id);
                    self.assign(instruction, id);
                }
                Some(_) => {
                    // The endpoint is gone; fall back to its name.
                    let name = instruction.endpoint_name().unwrap_or_default().to_string();
                    instruction.endpoint = InstructionEndpoint::Name(name);
                    remaining.push(instruction);
                }
                None => remaining.push(instruction),
            }
        }
        remaining
    }

    fn caught(&mut self, instructions: Vec<RoutingInstruction>) -> RouterResult<Vec<RoutingInstruction>> {
        let mut remaining = Vec::new();
        for instruction in instructions {
            let catcher = self.available().into_iter().find(|id| {
                let Some(EndpointKind::ViewportScope(options)) =
                    self.tree.endpoint(*id).map(|e| &e.kind)
                else {
                    return false;
                };
                let addressed = instruction
                    .endpoint_name()
                    .map_or(true, |name| name == options.name);
                addressed && options.catches_segment(instruction.component_name())
            });
            match catcher {
                Some(id) => {
                    let target = self.collection_item(id)?.unwrap_or(id);
                    self.assign(instruction, target);
                }
                None => remaining.push(instruction),
            }
        }
        Ok(remaining)
    }

    /// For a collection scope, a free item scope, grown when all are taken.
    fn collection_item(&mut self, id: EndpointId) -> RouterResult<Option<EndpointId>> {
        let Some(endpoint) = self.tree.endpoint(id) else {
            return Ok(None);
        };
        let Some(options) = endpoint.kind.scope_options().filter(|o| o.collection).cloned() else {
            return Ok(None);
        };
        let collection_scope = endpoint.scope;

        let items: Vec<EndpointId> = self
            .tree
            .endpoints_in(collection_scope)
            .into_iter()
            .filter(|item| {
                self.tree
                    .endpoint(*item)
                    .and_then(|e| e.kind.scope_options())
                    .is_some_and(|o| o.source_item.is_some())
            })
            .collect();
        if let Some(free) = items.iter().find(|item| !self.used.contains(item)) {
            return Ok(Some(*free));
        }

        let item = options.item(items.len());
        debug!(collection = %options.name, item = %item.name, "Collection grown");
        let connected = self
            .tree
            .connect_endpoint(collection_scope, None, item.into())?;
        Ok(connected.first().copied())
    }

    fn affinity(&mut self, instructions: Vec<RoutingInstruction>) -> Vec<RoutingInstruction> {
        let mut remaining = Vec::new();
        for instruction in instructions {
            if instruction.endpoint_name().is_some() {
                remaining.push(instruction);
                continue;
            }
            let component = instruction.component_name();
            let target = self.available().into_iter().find(|id| {
                self.tree
                    .endpoint(*id)
                    .and_then(|e| e.kind.viewport_options())
                    .is_some_and(|o| o.used_by.iter().any(|name| name == component))
            });
            match target {
                Some(id) => self.assign(instruction, id),
                None => remaining.push(instruction),
            }
        }
        remaining
    }

    fn named(&mut self, instructions: Vec<RoutingInstruction>) -> Vec<RoutingInstruction> {
        let mut remaining = Vec::new();
        for instruction in instructions {
            let Some(name) = instruction.endpoint_name() else {
                remaining.push(instruction);
                continue;
            };
            let target = self.available().into_iter().find(|id| {
                self.tree
                    .endpoint(*id)
                    .is_some_and(|e| e.is_viewport() && e.name() == name)
            });
            match target {
                Some(id) => self.assign(instruction, id),
                None => remaining.push(instruction),
            }
        }
        remaining
    }

    fn elimination(&mut self, instructions: Vec<RoutingInstruction>) -> Vec<RoutingInstruction> {
        let mut remaining = Vec::new();
        for instruction in instructions {
            if instruction.endpoint_name().is_some() {
                remaining.push(instruction);
                continue;
            }
            let component = instruction.component_name();
            let candidates: Vec<EndpointId> = self
                .available()
                .into_iter()
                .filter(|id| {
                    self.tree
                        .endpoint(*id)
                        .and_then(|e| e.kind.viewport_options())
                        .is_some_and(|o| o.accepts(component))
                })
                .collect();
            match candidates.as_slice() {
                [only] => {
                    let only = *only;
                    self.assign(instruction, only);
                }
                _ => remaining.push(instruction),
            }
        }
        remaining
    }
}

/// Match `instructions` against the endpoints of `scope`.
///
/// `earlier` lists endpoints already used in this scope by the current
/// navigation; they only take instructions bound to them.
pub fn match_endpoints(
    tree: &mut RouterTree,
    scope: ScopeId,
    instructions: Vec<RoutingInstruction>,
    earlier: &[EndpointId],
    max_iterations: usize,
) -> RouterResult<MatchResult> {
    let mut pass = Pass {
        tree,
        scope,
        used: earlier.to_vec(),
        matched: Vec::new(),
    };
    let mut remaining: Vec<RoutingInstruction> =
        instructions.into_iter().filter(|i| !i.is_add()).collect();

    let mut iterations = 0;
    while !remaining.is_empty() {
        iterations += 1;
        if iterations > max_iterations {
            return Err(RouterError::UnresolvedInstructions {
                iterations: max_iterations,
                remaining: remaining.iter().map(describe).collect(),
            });
        }
        let before = remaining.len();
        remaining = pass.bound(remaining);
        remaining = pass.caught(remaining)?;
        remaining = pass.affinity(remaining);
        remaining = pass.named(remaining);
        remaining = pass.elimination(remaining);
        if remaining.len() == before {
            break;
        }
    }

    debug!(
        %scope,
        matched = pass.matched.len(),
        remaining = remaining.len(),
        "Endpoints matched"
    );
    Ok(MatchResult {
        matched: pass.matched,
        remaining,
    })
}
