//! # Viewport Router Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Parser and navigation throughput (criterion)
//! └── src/integration/  # Router flows across core, bus and adapters
//!     ├── support.rs    # Recording components and the router harness
//!     ├── scenarios.rs  # Nested paths, unmatched siblings, guards, defaults, cancel
//!     ├── coordination.rs
//!     ├── history.rs
//!     ├── routes.rs
//!     └── events.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p router-tests
//!
//! # By category
//! cargo test -p router-tests integration::scenarios
//! cargo test -p router-tests integration::history
//!
//! # Benchmarks
//! cargo bench -p router-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
