//! # Domain Layer
//!
//! Instruction model, endpoints, the routing scope tree, matching and
//! cross-endpoint coordination. No I/O happens here.

pub mod content;
pub mod coordinator;
pub mod endpoint;
pub mod instruction;
pub mod matcher;
pub mod navigation;
pub mod parser;
pub mod scope;

pub use content::{Content, ContentGuards, ContentId, ContentStates};
pub use coordinator::{ContentLifecycle, DiscoveryGuard, NavigationCoordinator, Reservation};
pub use endpoint::{
    ContentAction, Endpoint, EndpointDeclaration, EndpointId, EndpointKind, ViewportOptions,
    ViewportScopeOptions,
};
pub use instruction::{
    InstructionComponent, InstructionEndpoint, InstructionParameters, LazyComponent,
    RoutingInstruction, ADD_COMPONENT, CLEAR_COMPONENT,
};
pub use matcher::{match_endpoints, MatchResult, MatchedInstruction};
pub use navigation::{
    LoadInstructions, LoadOptions, Navigation, NavigationCompletion, NavigationFlags,
    NavigationId, NavigationOutcome, NavigationRecord, NavigationState, NavigationStoreState,
};
pub use parser::{FullDescriber, InstructionDescriber, InstructionParser, Separators};
pub use scope::{ContentChange, RouterTree, RoutingScope, ScopeId};
