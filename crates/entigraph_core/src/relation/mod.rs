//! Relation payloads, links and the adjacency ledger.
//!
//! Entities carry [`RelationValue`] payloads describing link changes. On
//! save they are turned into [`Link`] batches (direct links first, then the
//! inverse links of mutual relations) and applied to the
//! [`RelationLedger`], which is the single source of truth for relation
//! state.

mod ledger;
mod link;
mod ordered_set;
mod plan;
mod value;

pub use ledger::RelationLedger;
pub use link::{Link, LinkBatch, LinkOption};
pub use ordered_set::OrderedIdSet;
pub(crate) use plan::plan_links;
pub use value::RelationValue;
