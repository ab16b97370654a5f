//! Index Engine - automatic index management per entity type.
//!
//! The engine owns every secondary index declared in the schema and keeps
//! them in sync with the entity store:
//!
//! 1. `on_insert`/`on_remove` are called for every store mutation
//! 2. Unique conflicts are reported before a save mutates anything
//! 3. The query planner asks for narrowed candidate sets and falls back
//!    to scanning when no index fits
//!
//! # Invariants
//!
//! - Every index exactly reflects the store contents of its type
//! - An indexed answer equals the answer of a scan
//! - Index state is derivable from the store alone (see [`IndexEngine::verify`])

use std::collections::{HashMap, HashSet};

use entigraph_codec::Value;

use crate::entity::{Entity, EntityId, EntityStore};
use crate::index::traits::{Comparison, IndexKey, SecondaryIndex};
use crate::index::{FtsIndex, HashIndex, SortIndex, UniqueIndex};
use crate::schema::{CollisionPolicy, IndexDef, IndexKind, Schema};
use crate::types::{SequenceNumber, SortOrder, TypeName};

/// One declared index of any kind.
#[derive(Debug)]
pub enum IndexSlot {
    /// Hash index.
    Hash(HashIndex),
    /// Unique index.
    Unique(UniqueIndex),
    /// Sort index.
    Sort(SortIndex),
    /// Full-text index.
    FullText(FtsIndex),
}

impl IndexSlot {
    fn from_def(def: &IndexDef) -> Self {
        match def.kind {
            IndexKind::Hash => Self::Hash(HashIndex::new(def.clone())),
            IndexKind::Unique(_) => Self::Unique(UniqueIndex::new(def.clone())),
            IndexKind::Sort(_) => Self::Sort(SortIndex::new(def.clone())),
            IndexKind::FullText(_) => Self::FullText(FtsIndex::new(def.clone())),
        }
    }

    /// The index behind this slot.
    #[must_use]
    pub fn as_index(&self) -> &dyn SecondaryIndex {
        match self {
            Self::Hash(index) => index,
            Self::Unique(index) => index,
            Self::Sort(index) => index,
            Self::FullText(index) => index,
        }
    }

    fn as_index_mut(&mut self) -> &mut dyn SecondaryIndex {
        match self {
            Self::Hash(index) => index,
            Self::Unique(index) => index,
            Self::Sort(index) => index,
            Self::FullText(index) => index,
        }
    }

    /// Canonical rendering of the index contents, independent of the
    /// order entries were added in.
    fn digest(&self, store: &EntityStore, type_name: &str) -> Vec<String> {
        let ids = store.ids(type_name);
        let mut lines: Vec<String> = match self {
            Self::Hash(index) => ids
                .iter()
                .filter_map(|id| index.key_of(id).map(|key| format!("{key} -> {id}")))
                .collect(),
            Self::Unique(index) => ids
                .iter()
                .filter_map(|id| {
                    let entity = store.find(type_name, id)?;
                    let key = IndexKey::extract(entity, &index.def().fields);
                    (index.holder(&key) == Some(id)).then(|| format!("{key} -> {id}"))
                })
                .collect(),
            Self::Sort(index) => {
                return index.ids().map(ToString::to_string).collect();
            }
            Self::FullText(index) => ids
                .iter()
                .filter_map(|id| {
                    let mut tokens: Vec<_> = index.tokens_for_entity(id)?.iter().cloned().collect();
                    tokens.sort();
                    Some(format!("{id}: {}", tokens.join(" ")))
                })
                .collect(),
        };
        lines.push(format!("len {}", self.as_index().len()));
        lines.sort();
        lines
    }
}

/// A save that would claim a unique key held by another entity.
#[derive(Debug, Clone)]
pub struct UniqueConflict {
    /// Name of the unique index.
    pub index: String,
    /// The contested key.
    pub key: IndexKey,
    /// Current holder of the key.
    pub holder: EntityId,
    /// Policy of the index.
    pub policy: CollisionPolicy,
}

/// The index engine managing all indexes of a context.
///
/// This is invisible to most callers: the context maintains it on every
/// mutation and the query engine asks it for access paths.
#[derive(Debug, Default)]
pub struct IndexEngine {
    types: HashMap<TypeName, Vec<IndexSlot>>,
}

impl IndexEngine {
    /// Creates an engine with no indexes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty indexes for every declaration in the schema.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let types = schema
            .types()
            .map(|entity| {
                let slots = entity.indexes().iter().map(IndexSlot::from_def).collect();
                (entity.name().clone(), slots)
            })
            .collect();
        Self { types }
    }

    /// Indexes declared for a type, in declaration order.
    #[must_use]
    pub fn indexes(&self, type_name: &str) -> &[IndexSlot] {
        self.types.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, type_name: &str, name: &str) -> Option<&IndexSlot> {
        self.indexes(type_name)
            .iter()
            .find(|slot| slot.as_index().def().name == name)
    }

    /// Indexes (or re-indexes) a stored entity.
    pub fn on_insert(&mut self, entity: &Entity, seq: SequenceNumber) {
        if let Some(slots) = self.types.get_mut(entity.type_name().as_str()) {
            for slot in slots {
                slot.as_index_mut().upsert(entity, seq);
            }
        }
    }

    /// Drops an entity from every index of its type.
    pub fn on_remove(&mut self, type_name: &str, id: &EntityId) {
        if let Some(slots) = self.types.get_mut(type_name) {
            for slot in slots {
                slot.as_index_mut().remove(id);
            }
        }
    }

    /// Unique keys of `entity` currently held by other entities.
    #[must_use]
    pub fn unique_conflicts(&self, entity: &Entity) -> Vec<UniqueConflict> {
        self.indexes(entity.type_name().as_str())
            .iter()
            .filter_map(|slot| match slot {
                IndexSlot::Unique(index) => {
                    index.conflict(entity).map(|(key, holder)| UniqueConflict {
                        index: index.def().name.clone(),
                        key,
                        holder: holder.clone(),
                        policy: index.policy(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Holder of a key in a named unique index.
    #[must_use]
    pub fn unique_holder(&self, type_name: &str, index: &str, key: &IndexKey) -> Option<&EntityId> {
        match self.index(type_name, index) {
            Some(IndexSlot::Unique(index)) => index.holder(key),
            _ => None,
        }
    }

    /// Equality lookup through the hash or unique index covering the most
    /// of the given `(field, value)` pairs.
    ///
    /// Every field of the chosen index must be among the pairs. Returns the
    /// matching ids and the fields the index consumed, or `None` when no
    /// index applies.
    #[must_use]
    pub fn lookup_eq(
        &self,
        type_name: &str,
        pairs: &[(&str, &Value)],
    ) -> Option<(HashSet<EntityId>, Vec<String>)> {
        let value_of = |field: &str| pairs.iter().find(|(f, _)| *f == field).map(|(_, v)| *v);

        let mut best: Option<(&IndexSlot, IndexKey)> = None;
        for slot in self.indexes(type_name) {
            if !matches!(slot, IndexSlot::Hash(_) | IndexSlot::Unique(_)) {
                continue;
            }
            let fields = &slot.as_index().def().fields;
            let Some(values) = fields
                .iter()
                .map(|f| value_of(f.as_str()).cloned())
                .collect::<Option<Vec<Value>>>()
            else {
                continue;
            };
            let key = IndexKey::from_values(values);
            if matches!(slot, IndexSlot::Unique(_)) && key.has_null() {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, _)) => {
                    let current_len = current.as_index().def().fields.len();
                    fields.len() > current_len
                        || (fields.len() == current_len
                            && matches!(slot, IndexSlot::Unique(_))
                            && matches!(current, IndexSlot::Hash(_)))
                }
            };
            if better {
                best = Some((slot, key));
            }
        }

        let (slot, key) = best?;
        let ids = match slot {
            IndexSlot::Hash(index) => index.lookup(&key),
            IndexSlot::Unique(index) => index.holder(&key).cloned().into_iter().collect(),
            _ => return None,
        };
        Some((ids, slot.as_index().def().fields.clone()))
    }

    /// Range narrowing through a sort index led by `field`.
    #[must_use]
    pub fn range(
        &self,
        type_name: &str,
        field: &str,
        comparison: Comparison,
        operand: &Value,
    ) -> Option<HashSet<EntityId>> {
        self.indexes(type_name).iter().find_map(|slot| match slot {
            IndexSlot::Sort(index) if index.def().fields.first().map(String::as_str) == Some(field) => {
                Some(index.range(comparison, operand).into_iter().collect())
            }
            _ => None,
        })
    }

    /// All ids in the order of a sort index whose comparators are exactly
    /// `comparators`.
    #[must_use]
    pub fn sorted_ids(&self, type_name: &str, comparators: &[(String, SortOrder)]) -> Option<Vec<EntityId>> {
        self.indexes(type_name).iter().find_map(|slot| match slot {
            IndexSlot::Sort(index)
                if index
                    .comparators()
                    .eq(comparators.iter().map(|(f, o)| (f.as_str(), *o))) =>
            {
                Some(index.ids().cloned().collect())
            }
            _ => None,
        })
    }

    /// Candidate superset for a `contains` predicate on `field`.
    #[must_use]
    pub fn contains_candidates(
        &self,
        type_name: &str,
        field: &str,
        pattern: &str,
        case_insensitive: bool,
    ) -> Option<HashSet<EntityId>> {
        self.full_text_on(type_name, field)
            .find_map(|index| index.contains_candidates(pattern, case_insensitive))
    }

    /// Candidate superset for a fuzzy `matches` predicate on `field`.
    #[must_use]
    pub fn fuzzy_candidates(
        &self,
        type_name: &str,
        field: &str,
        query: &str,
        threshold: f64,
    ) -> Option<HashSet<EntityId>> {
        self.full_text_on(type_name, field)
            .find_map(|index| index.fuzzy_candidates(query, threshold))
    }

    /// Token search (AND semantics) in a named full-text index.
    #[must_use]
    pub fn search_tokens(&self, type_name: &str, index: &str, query: &str) -> Option<HashSet<EntityId>> {
        match self.index(type_name, index) {
            Some(IndexSlot::FullText(index)) => Some(index.search(query)),
            _ => None,
        }
    }

    fn full_text_on<'a>(&'a self, type_name: &str, field: &'a str) -> impl Iterator<Item = &'a FtsIndex> + 'a {
        self.indexes(type_name).iter().filter_map(move |slot| match slot {
            IndexSlot::FullText(index) if index.covers(field) => Some(index),
            _ => None,
        })
    }

    /// Rebuilds the indexes of a type from the store and lists every index
    /// whose contents differ from the maintained one.
    #[must_use]
    pub fn verify(&self, type_name: &str, store: &EntityStore) -> Vec<String> {
        let mut divergent = Vec::new();
        for slot in self.indexes(type_name) {
            let mut fresh = IndexSlot::from_def(slot.as_index().def());
            for entity in store.all(type_name) {
                if let Some(seq) = store.seq_of(type_name, entity.id()) {
                    fresh.as_index_mut().upsert(entity, seq);
                }
            }
            if slot.digest(store, type_name) != fresh.digest(store, type_name) {
                divergent.push(slot.as_index().def().name.clone());
            }
        }
        divergent
    }
}
