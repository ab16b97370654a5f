//! Sort index implementation.

use std::cmp::Ordering;
use std::collections::HashMap;

use entigraph_codec::Value;

use crate::entity::{Entity, EntityId};
use crate::index::traits::{Comparison, IndexKey, SecondaryIndex};
use crate::schema::{IndexDef, IndexKind};
use crate::types::{SequenceNumber, SortOrder};

#[derive(Debug, Clone)]
struct SortEntry {
    key: IndexKey,
    seq: SequenceNumber,
    id: EntityId,
}

/// Ids kept in comparator order.
///
/// Entries compare field by field in the declared directions; ties are
/// broken by insertion sequence, which matches a stable sort over
/// store order. Maintained by binary-search insertion and removal.
///
/// # Example
///
/// ```rust,ignore
/// let def = IndexDef::sort("by_rank", [("rank", SortOrder::Descending)]);
/// let mut index = SortIndex::new(def);
/// index.upsert(&entity, seq);
/// let top: Vec<_> = index.ids().take(10).collect();
/// ```
#[derive(Debug)]
pub struct SortIndex {
    def: IndexDef,
    orders: Vec<SortOrder>,
    entries: Vec<SortEntry>,
    forward: HashMap<EntityId, (IndexKey, SequenceNumber)>,
}

impl SortIndex {
    /// Creates an empty sort index.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        let orders = match &def.kind {
            IndexKind::Sort(orders) => orders.clone(),
            _ => vec![SortOrder::Ascending; def.fields.len()],
        };
        Self {
            def,
            orders,
            entries: Vec::new(),
            forward: HashMap::new(),
        }
    }

    /// Comparator fields with their directions.
    pub fn comparators(&self) -> impl Iterator<Item = (&str, SortOrder)> {
        self.def
            .fields
            .iter()
            .map(String::as_str)
            .zip(self.orders.iter().copied())
    }

    /// Ids in index order.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.iter().map(|e| &e.id)
    }

    /// Ids whose leading field satisfies `comparison` against `operand`,
    /// in index order.
    #[must_use]
    pub fn range(&self, comparison: Comparison, operand: &Value) -> Vec<EntityId> {
        let descending = self.orders.first() == Some(&SortOrder::Descending);
        let len = self.entries.len();
        let (start, end) = if descending {
            match comparison {
                Comparison::Eq => (
                    self.partition(|v| v > operand),
                    self.partition(|v| v >= operand),
                ),
                Comparison::Lt => (self.partition(|v| v >= operand), len),
                Comparison::Le => (self.partition(|v| v > operand), len),
                Comparison::Gt => (0, self.partition(|v| v > operand)),
                Comparison::Ge => (0, self.partition(|v| v >= operand)),
            }
        } else {
            match comparison {
                Comparison::Eq => (
                    self.partition(|v| v < operand),
                    self.partition(|v| v <= operand),
                ),
                Comparison::Lt => (0, self.partition(|v| v < operand)),
                Comparison::Le => (0, self.partition(|v| v <= operand)),
                Comparison::Gt => (self.partition(|v| v <= operand), len),
                Comparison::Ge => (self.partition(|v| v < operand), len),
            }
        };

        self.entries[start..end.max(start)]
            .iter()
            .filter(|e| comparison.holds(&e.key.values()[0], operand))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Number of leading entries whose first key component satisfies
    /// `pred`, which must hold on a prefix of the index.
    fn partition(&self, pred: impl Fn(&Value) -> bool) -> usize {
        self.entries.partition_point(|e| pred(&e.key.values()[0]))
    }

    fn compare(&self, key: &IndexKey, seq: SequenceNumber, entry: &SortEntry) -> Ordering {
        for ((a, b), order) in key
            .values()
            .iter()
            .zip(entry.key.values())
            .zip(&self.orders)
        {
            let ordering = order.apply(a.cmp(b));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        seq.cmp(&entry.seq)
    }

    fn position(&self, key: &IndexKey, seq: SequenceNumber) -> usize {
        self.entries
            .partition_point(|e| self.compare(key, seq, e) == Ordering::Greater)
    }
}

impl SecondaryIndex for SortIndex {
    fn def(&self) -> &IndexDef {
        &self.def
    }

    fn upsert(&mut self, entity: &Entity, seq: SequenceNumber) {
        let key = IndexKey::extract(entity, &self.def.fields);
        if let Some((old_key, old_seq)) = self.forward.get(entity.id()) {
            if *old_key == key && *old_seq == seq {
                return;
            }
        }
        self.remove(entity.id());

        let at = self.position(&key, seq);
        self.entries.insert(
            at,
            SortEntry {
                key: key.clone(),
                seq,
                id: entity.id().clone(),
            },
        );
        self.forward.insert(entity.id().clone(), (key, seq));
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let Some((key, seq)) = self.forward.remove(id) else {
            return false;
        };
        let at = self.position(&key, seq);
        if self.entries.get(at).is_some_and(|e| &e.id == id) {
            self.entries.remove(at);
        } else if let Some(at) = self.entries.iter().position(|e| &e.id == id) {
            self.entries.remove(at);
        }
        true
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.forward.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, score: i64, name: &str) -> Entity {
        Entity::new("Player", id)
            .with_field("score", score)
            .with_field("name", name)
    }

    fn ids(index: &SortIndex) -> Vec<&str> {
        index.ids().map(EntityId::as_str).collect()
    }

    fn by_score_desc() -> SortIndex {
        SortIndex::new(IndexDef::sort(
            "by_score",
            [("score", SortOrder::Descending), ("name", SortOrder::Ascending)],
        ))
    }

    #[test]
    fn keeps_comparator_order() {
        let mut index = by_score_desc();
        index.upsert(&player("a", 10, "zed"), SequenceNumber::new(1));
        index.upsert(&player("b", 30, "amy"), SequenceNumber::new(2));
        index.upsert(&player("c", 10, "abe"), SequenceNumber::new(3));
        assert_eq!(ids(&index), vec!["b", "c", "a"]);
    }

    #[test]
    fn ties_break_by_sequence() {
        let mut index = SortIndex::new(IndexDef::sort("by_score", [("score", SortOrder::Ascending)]));
        index.upsert(&player("late", 5, "x"), SequenceNumber::new(9));
        index.upsert(&player("early", 5, "x"), SequenceNumber::new(2));
        assert_eq!(ids(&index), vec!["early", "late"]);
    }

    #[test]
    fn update_moves_entry() {
        let mut index = by_score_desc();
        index.upsert(&player("a", 10, "a"), SequenceNumber::new(1));
        index.upsert(&player("b", 20, "b"), SequenceNumber::new(2));
        index.upsert(&player("a", 30, "a"), SequenceNumber::new(1));
        assert_eq!(ids(&index), vec!["a", "b"]);
        assert_eq!(index.len(), 2);

        assert!(index.remove(&EntityId::from("a")));
        assert_eq!(ids(&index), vec!["b"]);
    }

    #[test]
    fn ascending_range() {
        let mut index = SortIndex::new(IndexDef::sort("by_score", [("score", SortOrder::Ascending)]));
        for (i, score) in [5, 1, 9, 5, 3].into_iter().enumerate() {
            index.upsert(&player(&format!("p{i}"), score, "n"), SequenceNumber::new(i as u64));
        }
        index.upsert(&Entity::new("Player", "unscored"), SequenceNumber::new(10));

        let five = Value::from(5);
        assert_eq!(index.range(Comparison::Lt, &five).len(), 2);
        assert_eq!(index.range(Comparison::Le, &five).len(), 4);
        assert_eq!(index.range(Comparison::Gt, &five).len(), 1);
        assert_eq!(index.range(Comparison::Ge, &five).len(), 3);
        assert_eq!(index.range(Comparison::Eq, &five).len(), 2);
    }

    #[test]
    fn descending_range() {
        let mut index = by_score_desc();
        for (i, score) in [5, 1, 9, 5, 3].into_iter().enumerate() {
            index.upsert(&player(&format!("p{i}"), score, "n"), SequenceNumber::new(i as u64));
        }
        let five = Value::from(5);
        assert_eq!(index.range(Comparison::Lt, &five).len(), 2);
        assert_eq!(index.range(Comparison::Ge, &five).len(), 3);
        assert_eq!(index.range(Comparison::Eq, &five).len(), 2);
        assert_eq!(index.range(Comparison::Gt, &five), vec![EntityId::from("p2")]);
    }
}
