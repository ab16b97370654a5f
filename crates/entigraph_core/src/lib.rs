//! # EntiGraph Core
//!
//! In-process normalized object-graph engine for EntiGraph.
//!
//! This crate provides:
//! - An entity store with per-type merge-on-insert
//! - A bidirectional relation ledger with mutual-link symmetry
//! - Hash, unique, sort and full-text secondary indexes
//! - Declarative queries with recursive relation expansion
//! - Cascade/nullify deletes, detach, soft delete and restore
//! - Atomic top-level calls backed by an undo journal
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_core::{Context, Entity, EntitySchema, Predicate, Query, RelationDef, RelationValue, Schema};
//!
//! let schema = Schema::new()
//!     .with(EntitySchema::new("Chat").with_relation(RelationDef::to_many("messages", "Message").mutual("chat").cascade()))
//!     .with(EntitySchema::new("Message").with_relation(RelationDef::to_one("chat", "Chat").mutual("messages")));
//! let mut ctx = Context::new(schema)?;
//!
//! ctx.save(
//!     Entity::new("Chat", "c1").with_relation(
//!         "messages",
//!         RelationValue::entities(vec![Entity::new("Message", "m1").with_field("body", "hi")]),
//!     ),
//! )?;
//!
//! let hits = ctx.query(&Query::new("Message").filter(Predicate::contains("body", "hi")))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod context;
mod delete;
mod entity;
mod error;
mod index;
mod journal;
mod merge;
mod query;
mod relation;
mod save;
mod schema;
mod stats;
mod types;
pub mod wire;

pub use collection::{Collection, Model};
pub use config::Config;
pub use context::Context;
pub use delete::Tombstone;
pub use entity::{Entity, EntityId, EntityStore};
pub use error::{CoreError, CoreResult};
pub use index::{
    contains_text, fold_case, fuzzy_matches, levenshtein, similarity, Comparison, FtsIndex, HashIndex, IndexEngine,
    IndexKey, IndexSlot, SecondaryIndex, SortIndex, TokenizerConfig, UniqueConflict, UniqueIndex,
};
pub use merge::{MergeFn, MergeStrategy};
pub use query::{Expansion, ExpansionMode, Predicate, Query, QueryOptions};
pub use relation::{Link, LinkBatch, LinkOption, OrderedIdSet, RelationLedger, RelationValue};
pub use schema::{
    Cardinality, CollisionPolicy, DeleteRule, Direction, EntitySchema, IndexDef, IndexKind, RelationDef, Schema,
    Survivor, UniqueResolver, MAX_KEY_FIELDS,
};
pub use stats::{ContextStats, StatsSnapshot};
pub use types::{SequenceNumber, SortOrder, TypeName};
pub use wire::WireEncoding;
