//! # Endpoints
//!
//! Named slots of the routing scope tree. A [`Viewport`](EndpointKind::Viewport)
//! hosts a component with its full lifecycle; a
//! [`ViewportScope`](EndpointKind::ViewportScope) groups child endpoints and
//! only takes part in the barrier protocol.
//!
//! ## Content queue
//!
//! ```text
//! contents: [ active | pending(nav 7) ]
//!              │           │
//!              │           └── finalize(7) ──→ becomes active
//!              └── superseded ──→ disposed, or kept in the stateful cache
//! ```
//!
//! Index 0 always exists; an endpoint that never hosted anything holds an
//! empty content.

use crate::domain::content::{Content, ContentId, ContentStates};
use crate::domain::instruction::{InstructionComponent, RoutingInstruction};
use crate::domain::navigation::{NavigationFlags, NavigationId};
use crate::domain::scope::ScopeId;
use crate::ports::outbound::{ReloadBehavior, RoutableComponent};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Endpoint identifier, unique per router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint#{}", self.0)
    }
}

/// Options of a viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportOptions {
    pub name: String,
    /// Components this viewport prefers.
    pub used_by: Vec<String>,
    /// Instruction applied when nothing else targets the viewport.
    pub default: Option<String>,
    /// Component used when a requested one cannot be resolved.
    pub fallback: Option<String>,
    /// Leave the viewport out of the described path.
    pub no_link: bool,
    /// Keep superseded component instances for reuse.
    pub stateful: bool,
    /// Always describe the component, even when it is the default.
    pub force_description: bool,
    /// Children of the hosted component get their own scope.
    pub owns_scope: bool,
}

impl ViewportOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            used_by: Vec::new(),
            default: None,
            fallback: None,
            no_link: false,
            stateful: false,
            force_description: false,
            owns_scope: true,
        }
    }

    pub fn used_by<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used_by = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, instruction: impl Into<String>) -> Self {
        self.default = Some(instruction.into());
        self
    }

    pub fn with_fallback(mut self, component: impl Into<String>) -> Self {
        self.fallback = Some(component.into());
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn no_link(mut self) -> Self {
        self.no_link = true;
        self
    }

    pub fn force_description(mut self) -> Self {
        self.force_description = true;
        self
    }

    pub fn without_scope(mut self) -> Self {
        self.owns_scope = false;
        self
    }

    /// Whether the viewport accepts `component` when matched by elimination.
    pub fn accepts(&self, component: &str) -> bool {
        self.used_by.is_empty() || self.used_by.iter().any(|name| name == component)
    }
}

/// Options of a viewport scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportScopeOptions {
    pub name: String,
    /// Segments (component names) this scope catches.
    pub catches: Vec<String>,
    /// Grows one item scope per caught instruction.
    pub collection: bool,
    /// Endpoints declared inside the scope (inside every item for a collection).
    pub children: Vec<EndpointDeclaration>,
    /// Position in the backing collection, for item scopes.
    pub source_item: Option<usize>,
}

impl ViewportScopeOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catches: Vec::new(),
            collection: false,
            children: Vec::new(),
            source_item: None,
        }
    }

    pub fn catches<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.catches = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn with_children(mut self, children: Vec<EndpointDeclaration>) -> Self {
        self.children = children;
        self
    }

    pub fn catches_segment(&self, segment: &str) -> bool {
        self.catches.iter().any(|caught| caught == segment)
    }

    /// Item scope number `index` of this collection.
    pub fn item(&self, index: usize) -> Self {
        Self {
            name: format!("{}[{index}]", self.name),
            catches: Vec::new(),
            collection: false,
            children: self.children.clone(),
            source_item: Some(index),
        }
    }
}

/// The two endpoint variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    Viewport(ViewportOptions),
    ViewportScope(ViewportScopeOptions),
}

/// What a component declares to get an endpoint connected.
pub type EndpointDeclaration = EndpointKind;

impl EndpointKind {
    pub fn viewport(name: impl Into<String>) -> Self {
        Self::Viewport(ViewportOptions::new(name))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Viewport(options) => &options.name,
            Self::ViewportScope(options) => &options.name,
        }
    }

    pub fn is_viewport(&self) -> bool {
        matches!(self, Self::Viewport(_))
    }

    /// Enumerating a scope looks through this endpoint into its children.
    pub fn is_pass_through(&self) -> bool {
        match self {
            Self::Viewport(options) => !options.owns_scope,
            Self::ViewportScope(options) => options.catches.is_empty() || options.collection,
        }
    }

    pub fn viewport_options(&self) -> Option<&ViewportOptions> {
        match self {
            Self::Viewport(options) => Some(options),
            Self::ViewportScope(_) => None,
        }
    }

    pub fn scope_options(&self) -> Option<&ViewportScopeOptions> {
        match self {
            Self::ViewportScope(options) => Some(options),
            Self::Viewport(_) => None,
        }
    }
}

impl From<ViewportOptions> for EndpointKind {
    fn from(options: ViewportOptions) -> Self {
        Self::Viewport(options)
    }
}

impl From<ViewportScopeOptions> for EndpointKind {
    fn from(options: ViewportScopeOptions) -> Self {
        Self::ViewportScope(options)
    }
}

/// How an endpoint reacts to a new instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAction {
    /// Keep the active content; only children are processed.
    Skip,
    /// Refresh the active component in place.
    Reload,
    /// Replace the active content.
    Swap,
}

/// A live endpoint.
#[derive(Debug)]
pub struct Endpoint {
    pub id: EndpointId,
    pub kind: EndpointKind,
    /// Scope holding this endpoint's children.
    pub scope: ScopeId,
    /// Scope this endpoint lives in.
    pub parent_scope: ScopeId,
    contents: Vec<Content>,
    cache: VecDeque<Content>,
}

impl Endpoint {
    pub fn new(
        id: EndpointId,
        kind: EndpointKind,
        scope: ScopeId,
        parent_scope: ScopeId,
        initial: ContentId,
    ) -> Self {
        Self {
            id,
            kind,
            scope,
            parent_scope,
            contents: vec![Content::empty(initial)],
            cache: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn is_viewport(&self) -> bool {
        self.kind.is_viewport()
    }

    /// Active (last completed) content.
    pub fn content(&self) -> &Content {
        &self.contents[0]
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.contents[0]
    }

    /// Pending content, if a navigation is changing this endpoint.
    pub fn next_content(&self) -> Option<&Content> {
        self.contents.iter().skip(1).last()
    }

    /// Pending content if any, else the active one.
    pub fn relevant_content(&self) -> &Content {
        self.next_content().unwrap_or_else(|| self.content())
    }

    pub fn content_for(&self, navigation: NavigationId) -> Option<&Content> {
        self.contents
            .iter()
            .skip(1)
            .find(|content| content.navigation == navigation)
    }

    pub fn content_for_mut(&mut self, navigation: NavigationId) -> Option<&mut Content> {
        self.contents
            .iter_mut()
            .skip(1)
            .find(|content| content.navigation == navigation)
    }

    pub fn cached(&self) -> impl Iterator<Item = &Content> {
        self.cache.iter()
    }

    fn is_stateful(&self) -> bool {
        self.kind.viewport_options().is_some_and(|options| options.stateful)
    }

    /// Offer `next` to the endpoint.
    ///
    /// On `Swap` and `Reload` the content is queued as pending for its
    /// navigation, replacing an earlier pending content of the same
    /// navigation. On `Skip` it is dropped.
    pub fn set_next_content(&mut self, mut next: Content, flags: NavigationFlags) -> ContentAction {
        let navigation = next.navigation;
        let pending: Vec<Content> = self
            .contents
            .drain(1..)
            .filter(|content| content.navigation != navigation)
            .collect();
        self.contents.extend(pending);
        self.contents[0].reset_guards_for(navigation);

        let action = match &self.kind {
            EndpointKind::ViewportScope(_) => {
                let active = self.content();
                if !active.is_empty()
                    && active.instruction.component_name() == next.instruction.component_name()
                    && active.instruction.parameters.same(&next.instruction.parameters, &[])
                {
                    ContentAction::Skip
                } else {
                    ContentAction::Swap
                }
            }
            EndpointKind::Viewport(options) => {
                self.viewport_action(&next, options.stateful, flags)
            }
        };

        if action == ContentAction::Reload {
            next.adopt_instance(self.content());
        } else if action == ContentAction::Swap && self.is_stateful() {
            let name = next.component_name().to_string();
            if let Some(cached) = self
                .cache
                .iter()
                .find(|cached| cached.same_as(&next.instruction, &name))
            {
                debug!(endpoint = %self.id, component = %name, "Reusing cached component");
                next.adopt_instance(cached);
            }
        }

        debug!(
            endpoint = %self.id,
            component = %next.component_name(),
            navigation,
            ?action,
            "Next content set"
        );
        if action != ContentAction::Skip {
            self.contents.push(next);
        }
        action
    }

    fn viewport_action(&self, next: &Content, stateful: bool, flags: NavigationFlags) -> ContentAction {
        let active = self.content();
        if next.instruction.is_clear() {
            return if active.is_empty() {
                ContentAction::Skip
            } else {
                ContentAction::Swap
            };
        }
        if active.is_empty() {
            return ContentAction::Swap;
        }
        if let (InstructionComponent::Instance(requested), Some(hosted)) =
            (&next.instruction.component, &active.component)
        {
            if Arc::ptr_eq(requested, hosted) {
                return ContentAction::Skip;
            }
        }
        let name = next.component_name();
        if active.component_name() != name {
            return ContentAction::Swap;
        }

        let behavior = next
            .factory
            .as_ref()
            .or(active.factory.as_ref())
            .map(|factory| factory.reload_behavior())
            .unwrap_or_default();
        match behavior {
            ReloadBehavior::Reload => ContentAction::Reload,
            ReloadBehavior::Disallow if flags.contains(NavigationFlags::REFRESH) => {
                ContentAction::Reload
            }
            ReloadBehavior::Disallow => ContentAction::Skip,
            ReloadBehavior::Default => {
                if !active.same_as(&next.instruction, name) {
                    ContentAction::Swap
                } else if stateful && !flags.contains(NavigationFlags::REFRESH) {
                    ContentAction::Skip
                } else {
                    ContentAction::Reload
                }
            }
        }
    }

    /// Make the pending content of `navigation` active.
    ///
    /// Returns the superseded contents that must be disposed; contents kept in
    /// the stateful cache, and contents whose instance lives on in the new
    /// active content, are not returned. `None` when nothing was pending.
    pub fn finalize_content_change(
        &mut self,
        navigation: NavigationId,
        cache_size: usize,
    ) -> Option<Vec<Content>> {
        let index = self
            .contents
            .iter()
            .skip(1)
            .position(|content| content.navigation == navigation)?
            + 1;
        let next = self.contents.remove(index);
        let previous = std::mem::replace(&mut self.contents[0], next);

        let active_component = self.contents[0].component.clone();
        let same_instance = |content: &Content| match (&content.component, &active_component) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.cache.retain(|cached| !same_instance(cached));

        let mut superseded = Vec::new();
        if previous.component.is_none() || same_instance(&previous) {
            return Some(superseded);
        }
        if self.is_stateful() && cache_size > 0 {
            self.cache.push_back(previous);
            while self.cache.len() > cache_size {
                if let Some(evicted) = self.cache.pop_front() {
                    superseded.push(evicted);
                }
            }
        } else {
            superseded.push(previous);
        }
        Some(superseded)
    }

    /// Drop the pending content of `navigation`.
    pub fn cancel_content_change(&mut self, navigation: NavigationId) -> Option<Content> {
        let index = self
            .contents
            .iter()
            .skip(1)
            .position(|content| content.navigation == navigation)?
            + 1;
        let cancelled = self.contents.remove(index);
        debug!(endpoint = %self.id, navigation, "Content change cancelled");
        Some(cancelled)
    }

    /// The active component when a swap deactivated it and it must come back.
    pub fn deactivated_component(&self) -> Option<Arc<dyn RoutableComponent>> {
        let active = self.content();
        if active.states.contains(ContentStates::ACTIVATED) {
            return None;
        }
        active.component.clone()
    }

    /// Every component instance the endpoint holds, with whether it is
    /// currently activated. Consumes the endpoint.
    pub fn into_components(self) -> Vec<(Arc<dyn RoutableComponent>, bool)> {
        let mut components: Vec<(Arc<dyn RoutableComponent>, bool)> = Vec::new();
        for content in self.contents.into_iter().chain(self.cache) {
            let Some(component) = content.component else {
                continue;
            };
            if components.iter().any(|(known, _)| Arc::ptr_eq(known, &component)) {
                continue;
            }
            let activated = content.states.contains(ContentStates::ACTIVATED);
            components.push((component, activated));
        }
        components
    }

    /// Instruction describing the active content, bound to this endpoint.
    pub fn active_instruction(&self) -> Option<RoutingInstruction> {
        let active = self.content();
        if active.is_empty() {
            return None;
        }
        let mut instruction = active.instruction.clone_shallow();
        instruction.bind(self.id, self.name());
        Some(instruction)
    }
}
