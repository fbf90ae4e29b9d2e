//! # Integration Flows
//!
//! End-to-end navigations through a real [`router_core::Router`] wired to
//! the in-memory adapters and event bus.

pub mod support;

mod coordination;
mod events;
mod history;
mod routes;
mod scenarios;
