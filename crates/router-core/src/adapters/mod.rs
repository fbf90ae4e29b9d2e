//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-process implementations of the outbound ports.

mod component_registry;
mod history;
mod route_table;

pub use component_registry::{ComponentRegistry, FnComponentFactory};
pub use history::InMemoryHistory;
pub use route_table::{Route, RouteTable};
