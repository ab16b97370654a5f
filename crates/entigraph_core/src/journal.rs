//! Undo journal for atomic top-level calls.
//!
//! Every primitive mutation of a [`Context`](crate::Context) first records
//! the prior state of what it touches. Replaying the records in reverse
//! restores the state before the call exactly, sequence numbers included.

use crate::delete::Tombstone;
use crate::entity::{Entity, EntityId};
use crate::relation::OrderedIdSet;
use crate::types::{SequenceNumber, TypeName};

/// Prior state of one touched item.
#[derive(Debug, Clone)]
pub(crate) enum UndoOp {
    /// A stored entity; `None` when it did not exist.
    Entity {
        type_name: TypeName,
        id: EntityId,
        previous: Option<(SequenceNumber, Entity)>,
    },
    /// One ledger entry; `None` when it was empty.
    Link {
        type_name: TypeName,
        id: EntityId,
        relation: String,
        previous: Option<OrderedIdSet>,
    },
    /// A tombstone; `None` when there was none.
    Tombstone {
        type_name: TypeName,
        id: EntityId,
        previous: Option<Tombstone>,
    },
}

/// Records of the running top-level call.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    ops: Vec<UndoOp>,
    depth: usize,
}

impl Journal {
    /// Enters a top-level or nested call; returns true for the outermost.
    pub(crate) fn begin(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    /// Leaves a call. Records are dropped when the outermost call succeeds.
    pub(crate) fn commit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.ops.clear();
        }
    }

    /// Leaves the outermost call, handing back its records newest first.
    pub(crate) fn abort(&mut self) -> Vec<UndoOp> {
        self.depth = 0;
        let mut ops = std::mem::take(&mut self.ops);
        ops.reverse();
        ops
    }

    pub(crate) fn record(&mut self, op: UndoOp) {
        if self.depth > 0 {
            self.ops.push(op);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str) -> UndoOp {
        UndoOp::Entity {
            type_name: TypeName::from("User"),
            id: EntityId::from(id),
            previous: None,
        }
    }

    #[test]
    fn records_only_inside_calls() {
        let mut journal = Journal::default();
        journal.record(op("a"));
        assert_eq!(journal.len(), 0);

        assert!(journal.begin());
        journal.record(op("a"));
        assert_eq!(journal.len(), 1);
        journal.commit();
        assert_eq!(journal.len(), 0);
    }

    #[test]
    fn nested_calls_keep_records_until_outermost() {
        let mut journal = Journal::default();
        assert!(journal.begin());
        journal.record(op("a"));
        assert!(!journal.begin());
        journal.record(op("b"));
        journal.commit();
        assert_eq!(journal.len(), 2);

        let ops = journal.abort();
        let ids: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                UndoOp::Entity { id, .. } => id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(journal.len(), 0);
    }
}
