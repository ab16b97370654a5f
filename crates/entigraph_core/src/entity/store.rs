//! Type-erased entity storage with merge-on-insert.

use std::collections::{BTreeMap, HashMap};

use super::{Entity, EntityId};
use crate::merge::MergeStrategy;
use crate::types::{SequenceNumber, TypeName};

#[derive(Debug, Default)]
struct TypeTable {
    rows: HashMap<EntityId, (SequenceNumber, Entity)>,
    order: BTreeMap<SequenceNumber, EntityId>,
}

/// Map from (type, id) to the stored entity.
///
/// Each entity keeps the sequence number of its first insertion; per-type
/// iteration follows that order. The store has no index or ledger side
/// effects.
#[derive(Debug, Default)]
pub struct EntityStore {
    tables: HashMap<TypeName, TypeTable>,
    last_seq: SequenceNumber,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an entity by type and id.
    #[must_use]
    pub fn find(&self, type_name: &str, id: &EntityId) -> Option<&Entity> {
        self.tables
            .get(type_name)
            .and_then(|t| t.rows.get(id))
            .map(|(_, e)| e)
    }

    /// Returns entities in the order of `ids`, `None` for the missing ones.
    #[must_use]
    pub fn find_all(&self, type_name: &str, ids: &[EntityId]) -> Vec<Option<&Entity>> {
        ids.iter().map(|id| self.find(type_name, id)).collect()
    }

    /// Returns true if the entity is stored.
    #[must_use]
    pub fn contains(&self, type_name: &str, id: &EntityId) -> bool {
        self.find(type_name, id).is_some()
    }

    /// Returns the insertion sequence of a stored entity.
    #[must_use]
    pub fn seq_of(&self, type_name: &str, id: &EntityId) -> Option<SequenceNumber> {
        self.tables
            .get(type_name)
            .and_then(|t| t.rows.get(id))
            .map(|(seq, _)| *seq)
    }

    /// Returns every entity of a type in insertion order.
    #[must_use]
    pub fn all(&self, type_name: &str) -> Vec<&Entity> {
        match self.tables.get(type_name) {
            Some(table) => table
                .order
                .values()
                .filter_map(|id| table.rows.get(id).map(|(_, e)| e))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns every id of a type in insertion order.
    #[must_use]
    pub fn ids(&self, type_name: &str) -> Vec<EntityId> {
        self.tables
            .get(type_name)
            .map(|t| t.order.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entities of a type.
    #[must_use]
    pub fn count(&self, type_name: &str) -> usize {
        self.tables.get(type_name).map_or(0, |t| t.rows.len())
    }

    /// Number of entities across all types.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }

    /// Computes the value `insert` would store, without storing it.
    ///
    /// Relation payloads are stripped; an existing value is reconciled
    /// through `strategy`.
    #[must_use]
    pub fn merged(&self, entity: &Entity, strategy: &MergeStrategy) -> Entity {
        let incoming = entity.normalized();
        match self.find(entity.type_name().as_str(), entity.id()) {
            Some(existing) => strategy.merge(existing, &incoming).normalized(),
            None => incoming,
        }
    }

    /// Inserts or merges an entity.
    ///
    /// Returns the entity's sequence number and its previous stored value.
    pub fn insert(
        &mut self,
        entity: &Entity,
        strategy: &MergeStrategy,
    ) -> (SequenceNumber, Option<Entity>) {
        let merged = self.merged(entity, strategy);
        self.put(merged)
    }

    /// Stores an already reconciled entity, keeping an existing sequence.
    pub(crate) fn put(&mut self, entity: Entity) -> (SequenceNumber, Option<Entity>) {
        let type_name = entity.type_name().clone();
        let id = entity.id().clone();
        let existing_seq = self.seq_of(type_name.as_str(), &id);
        let seq = match existing_seq {
            Some(seq) => seq,
            None => {
                self.last_seq = self.last_seq.next();
                self.last_seq
            }
        };

        let table = self.tables.entry(type_name).or_default();
        let previous = table.rows.insert(id.clone(), (seq, entity));
        if previous.is_none() {
            table.order.insert(seq, id);
        }
        (seq, previous.map(|(_, e)| e))
    }

    /// Allocates a sequence number without storing anything.
    pub(crate) fn next_seq(&mut self) -> SequenceNumber {
        self.last_seq = self.last_seq.next();
        self.last_seq
    }

    /// Removes an entity, returning it with its sequence number.
    pub fn remove(&mut self, type_name: &str, id: &EntityId) -> Option<(SequenceNumber, Entity)> {
        let table = self.tables.get_mut(type_name)?;
        let (seq, entity) = table.rows.remove(id)?;
        table.order.remove(&seq);
        Some((seq, entity))
    }

    /// Puts back a previous state exactly, including its sequence number.
    ///
    /// `None` removes the entity. Used when undoing a failed call.
    pub(crate) fn restore(
        &mut self,
        type_name: &TypeName,
        id: &EntityId,
        previous: Option<(SequenceNumber, Entity)>,
    ) {
        self.remove(type_name.as_str(), id);
        if let Some((seq, entity)) = previous {
            let table = self.tables.entry(type_name.clone()).or_default();
            table.order.insert(seq, id.clone());
            table.rows.insert(id.clone(), (seq, entity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationValue;
    use entigraph_codec::Value;

    fn user(id: &str, name: &str) -> Entity {
        Entity::new("User", id).with_field("name", name)
    }

    #[test]
    fn insert_and_find() {
        let mut store = EntityStore::new();
        store.insert(&user("u1", "Ada"), &MergeStrategy::Replace);

        let found = store.find("User", &EntityId::from("u1")).unwrap();
        assert_eq!(found.field("name"), &Value::from("Ada"));
        assert!(store.find("User", &EntityId::from("u2")).is_none());
        assert!(store.find("Chat", &EntityId::from("u1")).is_none());
    }

    #[test]
    fn insert_strips_relations() {
        let mut store = EntityStore::new();
        let e = user("u1", "Ada").with_relation("chats", RelationValue::ids(["c1"]));
        store.insert(&e, &MergeStrategy::Replace);

        let found = store.find("User", &EntityId::from("u1")).unwrap();
        assert!(found.relations().is_empty());
    }

    #[test]
    fn iteration_follows_first_insertion() {
        let mut store = EntityStore::new();
        store.insert(&user("b", "B"), &MergeStrategy::Replace);
        store.insert(&user("a", "A"), &MergeStrategy::Replace);
        store.insert(&user("b", "B2"), &MergeStrategy::Replace);

        let ids: Vec<_> = store.ids("User").into_iter().map(|i| i.into_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.all("User")[0].field("name"), &Value::from("B2"));
    }

    #[test]
    fn find_all_preserves_order() {
        let mut store = EntityStore::new();
        store.insert(&user("u1", "Ada"), &MergeStrategy::Replace);
        store.insert(&user("u2", "Bob"), &MergeStrategy::Replace);

        let ids = vec![EntityId::from("u2"), EntityId::from("x"), EntityId::from("u1")];
        let found = store.find_all("User", &ids);
        assert_eq!(found[0].unwrap().id().as_str(), "u2");
        assert!(found[1].is_none());
        assert_eq!(found[2].unwrap().id().as_str(), "u1");
    }

    #[test]
    fn merge_applies_on_existing() {
        let mut store = EntityStore::new();
        store.insert(
            &user("u1", "Ada").with_field("email", "ada@example.com"),
            &MergeStrategy::Replace,
        );
        let (_, previous) = store.insert(
            &Entity::new("User", "u1").with_field("name", "Ada L."),
            &MergeStrategy::patch("email"),
        );
        assert!(previous.is_some());

        let found = store.find("User", &EntityId::from("u1")).unwrap();
        assert_eq!(found.field("name"), &Value::from("Ada L."));
        assert_eq!(found.field("email"), &Value::from("ada@example.com"));
    }

    #[test]
    fn remove_and_restore_keep_sequence() {
        let mut store = EntityStore::new();
        store.insert(&user("a", "A"), &MergeStrategy::Replace);
        store.insert(&user("b", "B"), &MergeStrategy::Replace);

        let removed = store.remove("User", &EntityId::from("a"));
        assert_eq!(store.count("User"), 1);

        store.restore(&TypeName::from("User"), &EntityId::from("a"), removed);
        let ids: Vec<_> = store.ids("User").into_iter().map(|i| i.into_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.total_count(), 2);
    }
}
