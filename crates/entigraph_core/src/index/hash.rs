//! Hash index implementation.

use std::collections::{HashMap, HashSet};

use crate::entity::{Entity, EntityId};
use crate::index::traits::{IndexKey, SecondaryIndex};
use crate::schema::IndexDef;
use crate::types::SequenceNumber;

/// Hash-based index for equality lookups over 1-4 fields.
///
/// Stores a mapping from key tuple to the set of entity ids holding it,
/// plus the reverse mapping so that an update can move an entity from its
/// old bucket to its new one. Empty buckets are dropped.
///
/// # Example
///
/// ```rust,ignore
/// let mut index = HashIndex::new(IndexDef::hash("by_owner", ["owner"]));
/// index.upsert(&entity, seq);
/// let ids = index.lookup(&IndexKey::from_values(vec![Value::from("ada")]));
/// ```
#[derive(Debug)]
pub struct HashIndex {
    def: IndexDef,
    entries: HashMap<IndexKey, HashSet<EntityId>>,
    forward: HashMap<EntityId, IndexKey>,
}

impl HashIndex {
    /// Creates an empty hash index.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        Self {
            def,
            entries: HashMap::new(),
            forward: HashMap::new(),
        }
    }

    /// Returns the ids holding a key.
    #[must_use]
    pub fn lookup(&self, key: &IndexKey) -> HashSet<EntityId> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Returns the key an entity is indexed under.
    #[must_use]
    pub fn key_of(&self, id: &EntityId) -> Option<&IndexKey> {
        self.forward.get(id)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.entries.len()
    }
}

impl SecondaryIndex for HashIndex {
    fn def(&self) -> &IndexDef {
        &self.def
    }

    fn upsert(&mut self, entity: &Entity, _seq: SequenceNumber) {
        let key = IndexKey::extract(entity, &self.def.fields);
        if self.forward.get(entity.id()) == Some(&key) {
            return;
        }
        self.remove(entity.id());
        self.entries
            .entry(key.clone())
            .or_default()
            .insert(entity.id().clone());
        self.forward.insert(entity.id().clone(), key);
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let Some(key) = self.forward.remove(id) else {
            return false;
        };
        if let Some(bucket) = self.entries.get_mut(&key) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.entries.remove(&key);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.forward.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.forward.clear();
    }
}
