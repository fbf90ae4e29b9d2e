//! # Routing Instruction Model
//!
//! Tree-shaped description of what a navigation wants: which component, in
//! which endpoint, with which parameters, owning which child instructions.

use crate::domain::endpoint::EndpointId;
use crate::domain::scope::ScopeId;
use crate::error::RouterResult;
use crate::ports::outbound::{ComponentFactory, RoutableComponent};
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Component name meaning "clear the endpoint".
pub const CLEAR_COMPONENT: &str = "-";
/// Component name meaning "add to the current state".
pub const ADD_COMPONENT: &str = "+";

type ComponentLoader =
    Arc<dyn Fn() -> BoxFuture<'static, RouterResult<Arc<dyn ComponentFactory>>> + Send + Sync>;

/// Component whose factory is produced on first use.
#[derive(Clone)]
pub struct LazyComponent {
    name: String,
    loader: ComponentLoader,
}

impl LazyComponent {
    pub fn new<F, Fut>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<Arc<dyn ComponentFactory>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            loader: Arc::new(move || loader().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the factory.
    pub async fn load(&self) -> RouterResult<Arc<dyn ComponentFactory>> {
        (self.loader)().await
    }
}

/// The component an instruction asks for.
#[derive(Clone)]
pub enum InstructionComponent {
    /// Component name, resolved through the component resolver.
    Name(String),
    /// Already resolved component type.
    Type(Arc<dyn ComponentFactory>),
    /// A live instance to host as is.
    Instance(Arc<dyn RoutableComponent>),
    /// Lazily produced component type.
    Lazy(LazyComponent),
}

impl InstructionComponent {
    /// Textual name of the component.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Type(factory) => factory.name(),
            Self::Instance(instance) => instance.name(),
            Self::Lazy(lazy) => lazy.name(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name().is_empty()
    }

    /// Same component: identical instance, identical type or equal names.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::Type(a), Self::Type(b)) if Arc::ptr_eq(a, b) => true,
            _ => self.name() == other.name(),
        }
    }

    /// Can be stringified and parsed back.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Name(_) | Self::Type(_))
    }
}

impl fmt::Debug for InstructionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "Name({name})"),
            Self::Type(factory) => write!(f, "Type({})", factory.name()),
            Self::Instance(instance) => write!(f, "Instance({})", instance.name()),
            Self::Lazy(lazy) => write!(f, "Lazy({})", lazy.name()),
        }
    }
}

impl From<&str> for InstructionComponent {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for InstructionComponent {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<dyn ComponentFactory>> for InstructionComponent {
    fn from(factory: Arc<dyn ComponentFactory>) -> Self {
        Self::Type(factory)
    }
}

impl From<Arc<dyn RoutableComponent>> for InstructionComponent {
    fn from(instance: Arc<dyn RoutableComponent>) -> Self {
        Self::Instance(instance)
    }
}

/// The endpoint an instruction targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstructionEndpoint {
    /// Any endpoint, decided by the matcher.
    #[default]
    None,
    /// Endpoint addressed by name.
    Name(String),
    /// A concrete live endpoint.
    Instance { id: EndpointId, name: String },
}

impl InstructionEndpoint {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Name(name) | Self::Instance { name, .. } => Some(name),
        }
    }

    pub fn id(&self) -> Option<EndpointId> {
        match self {
            Self::Instance { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Instruction parameters in any of their accepted shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstructionParameters {
    #[default]
    None,
    /// Raw text, `a,b` or `k=v,k2=v2`.
    Text(String),
    /// Positional values.
    List(Vec<String>),
    /// Keyed values.
    Map(BTreeMap<String, String>),
}

impl InstructionParameters {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Text(text) => text.is_empty(),
            Self::List(values) => values.is_empty(),
            Self::Map(values) => values.is_empty(),
        }
    }

    /// Key every value. Positional values take the declared parameter name at
    /// their position, or their index when no name is declared.
    pub fn normalize(&self, names: &[String]) -> BTreeMap<String, String> {
        let mut normalized = BTreeMap::new();
        let mut position = 0usize;
        let mut positional = |value: String, out: &mut BTreeMap<String, String>| {
            let key = names
                .get(position)
                .cloned()
                .unwrap_or_else(|| position.to_string());
            position += 1;
            out.insert(key, value);
        };

        match self {
            Self::None => {}
            Self::Text(text) => {
                for part in text.split(',').filter(|p| !p.is_empty()) {
                    match part.split_once('=') {
                        Some((key, value)) => {
                            normalized.insert(key.to_string(), value.to_string());
                        }
                        None => positional(part.to_string(), &mut normalized),
                    }
                }
            }
            Self::List(values) => {
                for value in values {
                    positional(value.clone(), &mut normalized);
                }
            }
            Self::Map(values) => normalized.extend(values.clone()),
        }
        normalized
    }

    /// Textual form used inside a parameter list.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Text(text) => text.clone(),
            Self::List(values) => values.join(","),
            Self::Map(values) => values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Equal after normalization.
    pub fn same(&self, other: &Self, names: &[String]) -> bool {
        self.normalize(names) == other.normalize(names)
    }
}

/// One node of an instruction tree.
#[derive(Debug, Clone)]
pub struct RoutingInstruction {
    pub component: InstructionComponent,
    pub endpoint: InstructionEndpoint,
    pub parameters: InstructionParameters,
    /// Whether children are routed in the endpoint's own scope.
    pub owns_scope: bool,
    pub next_scope_instructions: Option<Vec<RoutingInstruction>>,
    /// Relative path prefix (`/` or `../`).
    pub scope_modifier: String,
    /// Scope the instruction was matched in.
    pub scope: Option<ScopeId>,
    /// Configured route this instruction came from.
    pub route: Option<String>,
    /// Appended from an endpoint's default.
    pub default: bool,
    pub cancelled: bool,
    /// First instruction of a configured route.
    pub route_start: bool,
}

impl RoutingInstruction {
    pub fn new(component: impl Into<InstructionComponent>) -> Self {
        Self {
            component: component.into(),
            endpoint: InstructionEndpoint::None,
            parameters: InstructionParameters::None,
            owns_scope: true,
            next_scope_instructions: None,
            scope_modifier: String::new(),
            scope: None,
            route: None,
            default: false,
            cancelled: false,
            route_start: false,
        }
    }

    /// Instruction that clears `endpoint`.
    pub fn clear(endpoint: impl Into<String>) -> Self {
        Self::new(CLEAR_COMPONENT).in_endpoint(endpoint)
    }

    /// Target a named endpoint.
    pub fn in_endpoint(mut self, name: impl Into<String>) -> Self {
        self.endpoint = InstructionEndpoint::Name(name.into());
        self
    }

    pub fn with_parameters(mut self, parameters: InstructionParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_children(mut self, children: Vec<RoutingInstruction>) -> Self {
        self.next_scope_instructions = Some(children);
        self
    }

    /// Route children in the parent scope.
    pub fn without_scope(mut self) -> Self {
        self.owns_scope = false;
        self
    }

    pub fn with_scope_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.scope_modifier = modifier.into();
        self
    }

    /// Bind to a concrete endpoint.
    pub fn bind(&mut self, id: EndpointId, name: impl Into<String>) {
        self.endpoint = InstructionEndpoint::Instance {
            id,
            name: name.into(),
        };
    }

    pub fn component_name(&self) -> &str {
        self.component.name()
    }

    pub fn endpoint_name(&self) -> Option<&str> {
        self.endpoint.name()
    }

    pub fn children(&self) -> &[RoutingInstruction] {
        self.next_scope_instructions.as_deref().unwrap_or_default()
    }

    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// Copy without child instructions.
    pub fn clone_shallow(&self) -> Self {
        Self {
            next_scope_instructions: None,
            ..self.clone()
        }
    }

    pub fn is_clear(&self) -> bool {
        self.component_name() == CLEAR_COMPONENT
    }

    pub fn is_add(&self) -> bool {
        self.component_name() == ADD_COMPONENT
    }

    /// Both target the same endpoint: same bound instance, or same name.
    pub fn same_endpoint(&self, other: &Self) -> bool {
        match (self.endpoint.id(), other.endpoint.id()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self.endpoint_name(), other.endpoint_name()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    pub fn same_component(&self, other: &Self) -> bool {
        self.component.same(&other.component)
    }

    /// Same component and parameters, recursively, ignoring endpoints that
    /// only one side names.
    pub fn same_state(&self, other: &Self) -> bool {
        if !self.same_component(other) || !self.parameters.same(&other.parameters, &[]) {
            return false;
        }
        if let (Some(a), Some(b)) = (self.endpoint_name(), other.endpoint_name()) {
            if a != b {
                return false;
            }
        }
        let (mine, theirs) = (self.children(), other.children());
        mine.len() == theirs.len() && mine.iter().zip(theirs).all(|(a, b)| a.same_state(b))
    }

    /// Whether this tree carries only textual components.
    pub fn is_textual(&self) -> bool {
        self.component.is_textual() && self.children().iter().all(Self::is_textual)
    }
}
