//! # router-core
//!
//! Navigation engine for a component-tree router.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Instructions**: parsing and describing paths such as `a(1)@main/b+c`
//! - **Endpoints**: viewports hosting one component and viewport scopes
//!   grouping them, arranged in a routing scope tree
//! - **Matching**: assignment of instructions to endpoints, scope by scope
//! - **Coordination**: every endpoint a navigation touches walks the same
//!   transition states and synchronises on configurable barriers
//! - **History**: committed navigations with back, forward and refresh
//!
//! ## Architecture
//!
//! ```text
//!  host ──RouterApi──→ Router ──→ InstructionParser / RouteResolver
//!                        │
//!                        ├── scope pass ──→ match_endpoints ──→ RouterTree
//!                        │        │
//!                        │        └── EndpointTransition (Step scheduler)
//!                        │                 │
//!                        │                 └── RoutableComponent lifecycle
//!                        │
//!                        ├── NavigationCoordinator (barriers, rollback)
//!                        │
//!                        └── HistoryStore / EventPublisher
//! ```
//!
//! ## Endpoint transition
//!
//! ```text
//! guardedUnload ─→ guardedLoad ─→ guarded ─→ unloaded ─→ loaded ─→ routed ─→ swapped ─→ completed
//!       ║                                                                       ║            ║
//!    barrier                                                                 barrier      barrier
//! ```
//!
//! A denied guard cancels the whole navigation: every pending content is
//! rolled back and the previous state stays active.
//!
//! ## Example
//!
//! ```rust,ignore
//! use router_core::{
//!     ComponentRegistry, LoadOptions, Router, RouterConfig, RouterPorts, ViewportOptions,
//! };
//! use std::sync::Arc;
//! use router_core::ports::inbound::RouterApi;
//!
//! let registry = Arc::new(ComponentRegistry::new().with(home).with(about));
//! let router = Router::new(RouterConfig::default(), RouterPorts::new(registry));
//!
//! router.connect_endpoint(None, ViewportOptions::new("main").into()).await?;
//! router.load("about", LoadOptions::default()).await?;
//!
//! assert_eq!(router.current_path(), "about");
//! router.back().await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod ports;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use adapters::{ComponentRegistry, FnComponentFactory, InMemoryHistory, Route, RouteTable};
pub use config::{RouterConfig, SwapOrder};
pub use domain::{
    EndpointDeclaration, EndpointId, EndpointKind, InstructionComponent, InstructionEndpoint,
    InstructionParameters, InstructionParser, LoadInstructions, LoadOptions, Navigation,
    NavigationFlags, NavigationId, NavigationRecord, NavigationState, NavigationStoreState,
    RoutingInstruction, ScopeId, Separators, ViewportOptions, ViewportScopeOptions,
};
pub use error::{RouterError, RouterResult, RoutingMode};
pub use hooks::{HookDecision, HookId, HookRegistry, HookTarget, LifecycleHookKind};
pub use ports::inbound::RouterApi;
pub use ports::outbound::{
    ComponentFactory, ComponentResolver, GuardOutcome, HistoryStore, LifecycleContext,
    RedirectTarget, ReloadBehavior, RoutableComponent, RouteResolver,
};
pub use service::{Router, RouterPorts};

pub use router_bus;
