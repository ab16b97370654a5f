//! Secondary indexes.
//!
//! Indexes are accelerators only: every indexed answer equals the answer
//! of a linear scan over the store. They are declared in the schema and
//! maintained by the context on every mutation.
//!
//! # Index Types
//!
//! - [`HashIndex`]: equality lookup over 1-4 fields
//! - [`UniqueIndex`]: equality lookup with at most one holder per key
//! - [`SortIndex`]: ordered traversal and range narrowing
//! - [`FtsIndex`]: token postings for substring and fuzzy search

mod engine;
mod fts;
mod hash;
mod sort;
mod traits;
mod unique;

pub use engine::{IndexEngine, IndexSlot, UniqueConflict};
pub use fts::{
    contains_text, fold_case, fuzzy_matches, levenshtein, similarity, FtsIndex, TokenizerConfig,
};
pub use hash::HashIndex;
pub use sort::SortIndex;
pub use traits::{Comparison, IndexKey, SecondaryIndex};
pub use unique::UniqueIndex;
