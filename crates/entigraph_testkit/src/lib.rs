//! # EntiGraph Testkit
//!
//! Test utilities for EntiGraph.
//!
//! This crate provides:
//! - A chat-domain schema and context fixtures
//! - Property-based generators of entities and graph operations
//! - Invariant checkers (link symmetry, index fidelity, normalized storage)
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_testkit::prelude::*;
//!
//! #[test]
//! fn saves_keep_invariants() {
//!     let mut ctx = TestContext::chat();
//!     ctx.save(user("u1", "Ada")).unwrap();
//!     assert_invariants(&ctx);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;
mod logging;

pub use logging::init_tracing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::invariants::*;
}
