//! Ports (hexagonal architecture)
//!
//! - `inbound`: the router surface offered to hosting applications
//! - `outbound`: collaborators the engine requires (components, routes, history)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
