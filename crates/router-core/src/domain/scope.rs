//! # Routing Scope Tree
//!
//! Arena mirroring the live endpoint hierarchy. Scopes and endpoints are
//! indexed by stable ids; parent links and back references are plain ids.
//!
//! ```text
//! root scope
//! ├── main (viewport) ── scope ── owner: content#4
//! │                       ├── left  (viewport)
//! │                       └── right (viewport)
//! └── group (viewport scope, pass-through)
//!      └── side (viewport)      ← listed as if it lived in root
//! ```
//!
//! Children connected by a component carry the content that owns them. While
//! the parent endpoint has a pending content only that content's children are
//! visible, otherwise the active content's.

use crate::domain::content::{Content, ContentId};
use crate::domain::endpoint::{
    ContentAction, Endpoint, EndpointDeclaration, EndpointId, EndpointKind,
};
use crate::domain::instruction::RoutingInstruction;
use crate::domain::navigation::{NavigationFlags, NavigationId};
use crate::error::{RouterError, RouterResult};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Node of the scope tree.
#[derive(Debug, Clone)]
pub struct RoutingScope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    /// Insertion ordered.
    pub children: Vec<ScopeId>,
    /// Endpoint this scope belongs to; `None` for the root.
    pub endpoint: Option<EndpointId>,
    /// Content of the parent endpoint that connected this scope's endpoint.
    pub owner_content: Option<ContentId>,
    pub pass_through: bool,
}

/// Outcome of committing or rolling back an endpoint's content.
#[derive(Debug, Default)]
pub struct ContentChange {
    /// Contents to dispose.
    pub superseded: Vec<Content>,
    /// Endpoints removed with the content that owned them.
    pub removed: Vec<Endpoint>,
}

/// The arena.
#[derive(Debug)]
pub struct RouterTree {
    scopes: HashMap<ScopeId, RoutingScope>,
    endpoints: HashMap<EndpointId, Endpoint>,
    root: ScopeId,
    next_id: u64,
    cache_size: usize,
}

impl Default for RouterTree {
    fn default() -> Self {
        Self::new(10)
    }
}

impl RouterTree {
    pub fn new(cache_size: usize) -> Self {
        let root = ScopeId(0);
        let mut scopes = HashMap::new();
        scopes.insert(
            root,
            RoutingScope {
                id: root,
                parent: None,
                children: Vec::new(),
                endpoint: None,
                owner_content: None,
                pass_through: false,
            },
        );
        Self {
            scopes,
            endpoints: HashMap::new(),
            root,
            next_id: 1,
            cache_size,
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn next_content_id(&mut self) -> ContentId {
        ContentId(self.allocate())
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn scope(&self, id: ScopeId) -> Option<&RoutingScope> {
        self.scopes.get(&id)
    }

    pub fn endpoint(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    pub fn endpoint_mut(&mut self, id: EndpointId) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(&id)
    }

    pub fn require(&self, id: EndpointId) -> RouterResult<&Endpoint> {
        self.endpoints
            .get(&id)
            .ok_or(RouterError::UnknownEndpoint { id: id.0 })
    }

    pub fn require_mut(&mut self, id: EndpointId) -> RouterResult<&mut Endpoint> {
        self.endpoints
            .get_mut(&id)
            .ok_or(RouterError::UnknownEndpoint { id: id.0 })
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Endpoint whose own scope is `scope`.
    pub fn endpoint_of_scope(&self, scope: ScopeId) -> Option<EndpointId> {
        self.scopes.get(&scope).and_then(|node| node.endpoint)
    }

    /// Endpoint hosting the scope `endpoint` lives in.
    pub fn parent_endpoint(&self, endpoint: EndpointId) -> Option<EndpointId> {
        let parent_scope = self.endpoints.get(&endpoint)?.parent_scope;
        self.owning_endpoint(parent_scope)
    }

    fn owning_endpoint(&self, scope: ScopeId) -> Option<EndpointId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = self.scopes.get(&id)?;
            if let Some(endpoint) = node.endpoint {
                if !node.pass_through {
                    return Some(endpoint);
                }
            }
            current = node.parent;
        }
        None
    }

    /// Connect an endpoint under `parent_scope`.
    ///
    /// Reconnecting a name already connected by the same owner returns the
    /// existing endpoint. Returns every endpoint connected, the declared one
    /// first (viewport scopes connect their declared children too).
    pub fn connect_endpoint(
        &mut self,
        parent_scope: ScopeId,
        owner_content: Option<ContentId>,
        declaration: EndpointDeclaration,
    ) -> RouterResult<Vec<EndpointId>> {
        let parent = self
            .scopes
            .get(&parent_scope)
            .ok_or_else(|| RouterError::internal(format!("unknown {parent_scope}")))?;

        let existing = parent.children.iter().find_map(|child| {
            let node = self.scopes.get(child)?;
            let endpoint = self.endpoints.get(&node.endpoint?)?;
            (node.owner_content == owner_content && endpoint.name() == declaration.name())
                .then_some(endpoint.id)
        });
        if let Some(id) = existing {
            return Ok(vec![id]);
        }

        let id = EndpointId(self.allocate());
        let scope = ScopeId(self.allocate());
        let initial = self.next_content_id();
        let pass_through = declaration.is_pass_through();
        let template = match &declaration {
            EndpointKind::ViewportScope(options) if !options.collection => options.children.clone(),
            _ => Vec::new(),
        };

        self.scopes.insert(
            scope,
            RoutingScope {
                id: scope,
                parent: Some(parent_scope),
                children: Vec::new(),
                endpoint: Some(id),
                owner_content,
                pass_through,
            },
        );
        if let Some(parent) = self.scopes.get_mut(&parent_scope) {
            parent.children.push(scope);
        }
        debug!(endpoint = %id, name = declaration.name(), %parent_scope, "Endpoint connected");
        self.endpoints
            .insert(id, Endpoint::new(id, declaration, scope, parent_scope, initial));

        let mut connected = vec![id];
        for child in template {
            connected.extend(self.connect_endpoint(scope, None, child)?);
        }
        Ok(connected)
    }

    /// Remove an endpoint and everything below it.
    pub fn disconnect_endpoint(&mut self, id: EndpointId) -> Vec<Endpoint> {
        let Some(scope) = self.endpoints.get(&id).map(|endpoint| endpoint.scope) else {
            return Vec::new();
        };
        let parent = self.scopes.get(&scope).and_then(|node| node.parent);
        if let Some(parent) = parent.and_then(|parent| self.scopes.get_mut(&parent)) {
            parent.children.retain(|child| *child != scope);
        }

        let mut removed = Vec::new();
        self.remove_scope(scope, &mut removed);
        debug!(endpoint = %id, removed = removed.len(), "Endpoint disconnected");
        removed
    }

    /// Deepest endpoints first.
    fn remove_scope(&mut self, scope: ScopeId, removed: &mut Vec<Endpoint>) {
        let Some(node) = self.scopes.remove(&scope) else {
            return;
        };
        for child in node.children {
            self.remove_scope(child, removed);
        }
        if let Some(endpoint) = node.endpoint.and_then(|id| self.endpoints.remove(&id)) {
            removed.push(endpoint);
        }
    }

    /// Disconnect the endpoints `content` connected under `endpoint`.
    pub fn remove_content_children(
        &mut self,
        endpoint: EndpointId,
        content: ContentId,
    ) -> Vec<Endpoint> {
        let Some(scope) = self.endpoints.get(&endpoint).map(|e| e.scope) else {
            return Vec::new();
        };
        let owned: Vec<EndpointId> = self
            .scopes
            .get(&scope)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.scopes.get(child))
                    .filter(|child| child.owner_content == Some(content))
                    .filter_map(|child| child.endpoint)
                    .collect()
            })
            .unwrap_or_default();

        owned
            .into_iter()
            .flat_map(|child| self.disconnect_endpoint(child))
            .collect()
    }

    /// Child scopes of `scope` visible for its endpoint's relevant content.
    fn visible_children(&self, scope: ScopeId) -> Vec<&RoutingScope> {
        let Some(node) = self.scopes.get(&scope) else {
            return Vec::new();
        };
        let content = node
            .endpoint
            .and_then(|id| self.endpoints.get(&id))
            .map(|endpoint| endpoint.relevant_content().id);

        node.children
            .iter()
            .filter_map(|child| self.scopes.get(child))
            .filter(|child| child.owner_content.is_none() || child.owner_content == content)
            .collect()
    }

    /// Scopes owned by `scope`, looking through pass-through scopes.
    pub fn owned_scopes(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut owned = Vec::new();
        for child in self.visible_children(scope) {
            owned.push(child.id);
            if child.pass_through {
                owned.extend(self.owned_scopes(child.id));
            }
        }
        owned
    }

    /// Endpoints instructions processed in `scope` can target, in declaration order.
    pub fn endpoints_in(&self, scope: ScopeId) -> Vec<EndpointId> {
        self.owned_scopes(scope)
            .into_iter()
            .filter_map(|id| self.endpoint_of_scope(id))
            .collect()
    }

    /// Nearest scope at or above `scope` that is not pass-through.
    pub fn owning_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(node) = self.scopes.get(&current) {
            match node.parent {
                Some(parent) if node.pass_through => current = parent,
                _ => return current,
            }
        }
        self.root
    }

    /// Resolve a scope modifier (`/`, `../`, `../../`) against `scope`.
    pub fn scope_for_modifier(&self, scope: ScopeId, modifier: &str, parent_token: &str) -> ScopeId {
        if modifier.is_empty() {
            return scope;
        }
        if !modifier.starts_with(parent_token) {
            return self.root;
        }
        let mut current = self.owning_scope(scope);
        for _ in 0..modifier.matches(parent_token).count() {
            let parent = self
                .scopes
                .get(&current)
                .and_then(|node| self.endpoints.get(&node.endpoint?))
                .map(|endpoint| endpoint.parent_scope);
            match parent {
                Some(parent) => current = self.owning_scope(parent),
                None => return self.root,
            }
        }
        current
    }

    /// Offer a content to an endpoint.
    pub fn set_next_content(
        &mut self,
        endpoint: EndpointId,
        content: Content,
        flags: NavigationFlags,
    ) -> RouterResult<ContentAction> {
        Ok(self.require_mut(endpoint)?.set_next_content(content, flags))
    }

    /// Commit the pending content of `navigation` on `endpoint`.
    pub fn finalize_content_change(
        &mut self,
        endpoint: EndpointId,
        navigation: NavigationId,
    ) -> ContentChange {
        let cache_size = self.cache_size;
        let Some(target) = self.endpoints.get_mut(&endpoint) else {
            return ContentChange::default();
        };
        let previous = target.content().id;
        let Some(superseded) = target.finalize_content_change(navigation, cache_size) else {
            return ContentChange::default();
        };
        let removed = self.remove_content_children(endpoint, previous);
        ContentChange {
            superseded,
            removed,
        }
    }

    /// Roll back the pending content of `navigation` on `endpoint`.
    pub fn cancel_content_change(
        &mut self,
        endpoint: EndpointId,
        navigation: NavigationId,
    ) -> ContentChange {
        let Some(cancelled) = self
            .endpoints
            .get_mut(&endpoint)
            .and_then(|target| target.cancel_content_change(navigation))
        else {
            return ContentChange::default();
        };
        let removed = self.remove_content_children(endpoint, cancelled.id);
        ContentChange {
            superseded: vec![cancelled],
            removed,
        }
    }

    /// Endpoints connected by the active content of `endpoint`, recursively,
    /// deepest first.
    pub fn active_descendants(&self, endpoint: EndpointId) -> Vec<EndpointId> {
        let mut out = Vec::new();
        self.collect_active_descendants(endpoint, &mut out);
        out
    }

    fn collect_active_descendants(&self, endpoint: EndpointId, out: &mut Vec<EndpointId>) {
        let Some(current) = self.endpoints.get(&endpoint) else {
            return;
        };
        let active = current.content().id;
        let Some(node) = self.scopes.get(&current.scope) else {
            return;
        };
        for child in node.children.iter().filter_map(|child| self.scopes.get(child)) {
            if child.owner_content.is_some() && child.owner_content != Some(active) {
                continue;
            }
            if let Some(id) = child.endpoint {
                self.collect_active_descendants(id, out);
                out.push(id);
            }
        }
    }

    /// Instructions describing the active state below `scope`.
    pub fn active_instructions(&self, scope: ScopeId) -> Vec<RoutingInstruction> {
        let mut instructions = Vec::new();
        for child in self.active_children(scope) {
            let Some(endpoint) = child.endpoint.and_then(|id| self.endpoints.get(&id)) else {
                continue;
            };
            let children = self.active_instructions(endpoint.scope);
            match endpoint.active_instruction() {
                Some(instruction) if children.is_empty() => instructions.push(instruction),
                Some(instruction) => instructions.push(instruction.with_children(children)),
                None => instructions.extend(children),
            }
        }
        instructions
    }

    fn active_children(&self, scope: ScopeId) -> Vec<&RoutingScope> {
        let Some(node) = self.scopes.get(&scope) else {
            return Vec::new();
        };
        let active = node
            .endpoint
            .and_then(|id| self.endpoints.get(&id))
            .map(|endpoint| endpoint.content().id);
        node.children
            .iter()
            .filter_map(|child| self.scopes.get(child))
            .filter(|child| child.owner_content.is_none() || child.owner_content == active)
            .collect()
    }

    /// Find a visible endpoint by name below `scope`.
    pub fn find_endpoint(&self, scope: ScopeId, name: &str) -> Option<EndpointId> {
        self.endpoints_in(scope)
            .into_iter()
            .find(|id| self.endpoints.get(id).is_some_and(|e| e.name() == name))
    }
}
