//! Typed views over a context.
//!
//! Provides `Collection<T>` for working with Rust structs that convert to
//! and from entities via the `Model` trait.

mod model;
mod typed;

pub use model::Model;
pub use typed::Collection;
