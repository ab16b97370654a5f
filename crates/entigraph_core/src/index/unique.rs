//! Unique index implementation.

use std::collections::HashMap;

use tracing::debug;

use crate::entity::{Entity, EntityId};
use crate::index::traits::{IndexKey, SecondaryIndex};
use crate::schema::{CollisionPolicy, IndexDef, IndexKind};
use crate::types::SequenceNumber;

/// Index mapping each key tuple to at most one entity.
///
/// Keys with a null component are never claimed, so any number of entities
/// may leave a unique field unset. Collisions are resolved by the context
/// before `upsert` is called; see [`CollisionPolicy`].
#[derive(Debug)]
pub struct UniqueIndex {
    def: IndexDef,
    entries: HashMap<IndexKey, EntityId>,
    forward: HashMap<EntityId, IndexKey>,
}

impl UniqueIndex {
    /// Creates an empty unique index.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        Self {
            def,
            entries: HashMap::new(),
            forward: HashMap::new(),
        }
    }

    /// The collision policy of this index.
    #[must_use]
    pub fn policy(&self) -> CollisionPolicy {
        match &self.def.kind {
            IndexKind::Unique(policy) => policy.clone(),
            _ => CollisionPolicy::Fail,
        }
    }

    /// Returns the entity holding a key.
    #[must_use]
    pub fn holder(&self, key: &IndexKey) -> Option<&EntityId> {
        self.entries.get(key)
    }

    /// Returns the entity whose key would collide with `entity`, if any.
    #[must_use]
    pub fn conflict(&self, entity: &Entity) -> Option<(IndexKey, &EntityId)> {
        let key = IndexKey::extract(entity, &self.def.fields);
        if key.has_null() {
            return None;
        }
        match self.entries.get(&key) {
            Some(holder) if holder != entity.id() => Some((key, holder)),
            _ => None,
        }
    }
}

impl SecondaryIndex for UniqueIndex {
    fn def(&self) -> &IndexDef {
        &self.def
    }

    fn upsert(&mut self, entity: &Entity, _seq: SequenceNumber) {
        let key = IndexKey::extract(entity, &self.def.fields);
        if self.forward.get(entity.id()) == Some(&key) {
            return;
        }
        self.remove(entity.id());
        if key.has_null() {
            return;
        }
        if let Some(previous) = self.entries.insert(key.clone(), entity.id().clone()) {
            debug!(index = %self.def.name, key = %key, holder = %previous, "unique key taken over");
            self.forward.remove(&previous);
        }
        self.forward.insert(entity.id().clone(), key);
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let Some(key) = self.forward.remove(id) else {
            return false;
        };
        if self.entries.get(&key) == Some(id) {
            self.entries.remove(&key);
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
