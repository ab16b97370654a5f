//! Declarative queries over entity types.
//!
//! Resolution narrows candidates through the index engine where an index
//! serves a predicate and scans otherwise, then sorts, windows, projects and
//! expands relations. Indexed and scanned resolution return identical
//! results.

mod builder;
mod engine;
mod predicate;

pub use builder::{Expansion, ExpansionMode, Query, QueryOptions};
pub(crate) use engine::QueryEngine;
pub use predicate::Predicate;
