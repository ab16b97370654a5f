//! The context facade.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::Config;
use crate::delete::Tombstone;
use crate::entity::{Entity, EntityId, EntityStore};
use crate::error::CoreResult;
use crate::index::IndexEngine;
use crate::journal::{Journal, UndoOp};
use crate::query::{Query, QueryEngine};
use crate::relation::{LinkBatch, RelationLedger};
use crate::schema::Schema;
use crate::stats::ContextStats;
use crate::types::{SequenceNumber, TypeName};

/// An in-memory object graph: entities, their links and secondary indexes.
///
/// `Context` is the primary entry point. It owns one entity store, one
/// relation ledger, the index engine and the tombstones of soft-deleted
/// entities, and is mutated through `&mut self`.
///
/// Every mutating call is atomic: if it fails, the context is left exactly
/// as it was before the call.
///
/// # Example
///
/// ```rust,ignore
/// use entigraph_core::{Context, Entity, EntitySchema, RelationDef, RelationValue, Schema};
///
/// let schema = Schema::new()
///     .with(EntitySchema::new("User").with_relation(RelationDef::to_many("chats", "Chat").mutual("users")))
///     .with(EntitySchema::new("Chat").with_relation(RelationDef::to_many("users", "User").mutual("chats")));
/// let mut ctx = Context::new(schema)?;
///
/// ctx.save(Entity::new("User", "u1").with_field("name", "Ada"))?;
/// ctx.save(Entity::new("Chat", "c1").with_relation("users", RelationValue::ids(["u1"])))?;
///
/// assert_eq!(ctx.get_children("User", "chats", &"u1".into()), vec!["c1".into()]);
/// ```
#[derive(Debug)]
pub struct Context {
    pub(crate) schema: Arc<Schema>,
    pub(crate) config: Config,
    pub(crate) store: EntityStore,
    pub(crate) ledger: RelationLedger,
    pub(crate) indexes: IndexEngine,
    pub(crate) tombstones: HashMap<TypeName, HashMap<EntityId, Tombstone>>,
    pub(crate) stats: ContextStats,
    pub(crate) journal: Journal,
}

impl Context {
    /// Creates an empty context with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema`, `UnknownType` or `UnknownRelation` if the
    /// schema does not validate.
    pub fn new(schema: Schema) -> CoreResult<Self> {
        Self::with_config(schema, Config::default())
    }

    /// Creates an empty context with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema does not validate.
    pub fn with_config(schema: Schema, config: Config) -> CoreResult<Self> {
        schema.validate()?;
        let indexes = IndexEngine::from_schema(&schema);
        debug!(types = schema.types().count(), "context created");
        Ok(Self {
            schema: Arc::new(schema),
            config,
            store: EntityStore::new(),
            ledger: RelationLedger::new(),
            indexes,
            tombstones: HashMap::new(),
            stats: ContextStats::new(),
            journal: Journal::default(),
        })
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the operation counters.
    #[must_use]
    pub fn stats(&self) -> &ContextStats {
        &self.stats
    }

    /// Read access to the entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Read access to the relation ledger.
    #[must_use]
    pub fn ledger(&self) -> &RelationLedger {
        &self.ledger
    }

    /// Read access to the index engine.
    #[must_use]
    pub fn indexes(&self) -> &IndexEngine {
        &self.indexes
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Ids of a type in insertion order.
    #[must_use]
    pub fn ids(&self, type_name: &str) -> Vec<EntityId> {
        self.store.ids(type_name)
    }

    /// All entities of a type in insertion order.
    #[must_use]
    pub fn all(&self, type_name: &str) -> Vec<&Entity> {
        self.store.all(type_name)
    }

    /// Looks up one entity.
    #[must_use]
    pub fn find(&self, type_name: &str, id: &EntityId) -> Option<&Entity> {
        self.store.find(type_name, id)
    }

    /// Looks up several entities; `None` marks missing ones.
    #[must_use]
    pub fn find_all(&self, type_name: &str, ids: &[EntityId]) -> Vec<Option<&Entity>> {
        self.store.find_all(type_name, ids)
    }

    /// Looks up several entities, skipping missing ones.
    #[must_use]
    pub fn find_all_existing(&self, type_name: &str, ids: &[EntityId]) -> Vec<&Entity> {
        self.store.find_all(type_name, ids).into_iter().flatten().collect()
    }

    /// Linked ids of one relation, in link order.
    #[must_use]
    pub fn get_children(&self, type_name: &str, relation: &str, id: &EntityId) -> Vec<EntityId> {
        self.ledger.children(type_name, relation, id).to_vec()
    }

    /// Tombstone of a soft-deleted entity.
    #[must_use]
    pub fn tombstone(&self, type_name: &str, id: &EntityId) -> Option<&Tombstone> {
        self.tombstones.get(type_name)?.get(id)
    }

    /// Tombstones of a type, oldest deletion first.
    #[must_use]
    pub fn tombstones(&self, type_name: &str) -> Vec<&Tombstone> {
        let mut tombstones: Vec<&Tombstone> = self
            .tombstones
            .get(type_name)
            .map(|t| t.values().collect())
            .unwrap_or_default();
        tombstones.sort_by_key(|t| t.deleted_at());
        tombstones
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn query_engine(&self) -> QueryEngine<'_> {
        QueryEngine {
            schema: &self.schema,
            store: &self.store,
            ledger: &self.ledger,
            indexes: &self.indexes,
            config: &self.config,
            stats: &self.stats,
        }
    }

    /// Resolves a query to materialized entities.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelation` for an expansion the schema does not
    /// declare, or `InvalidOperation` when full scans are forbidden and the
    /// query needs one.
    pub fn query(&self, query: &Query) -> CoreResult<Vec<Entity>> {
        self.query_engine().resolve(query)
    }

    /// Resolves a query to ids only.
    ///
    /// # Errors
    ///
    /// See [`Context::query`].
    pub fn query_ids(&self, query: &Query) -> CoreResult<Vec<EntityId>> {
        self.query_engine().ids(query)
    }

    /// Number of results of a query, after offset and limit.
    ///
    /// # Errors
    ///
    /// See [`Context::query`].
    pub fn count(&self, query: &Query) -> CoreResult<usize> {
        Ok(self.query_engine().ids(query)?.len())
    }

    /// First result of a query.
    ///
    /// # Errors
    ///
    /// See [`Context::query`].
    pub fn first(&self, query: &Query) -> CoreResult<Option<Entity>> {
        self.query_engine().first(query)
    }

    /// One entity resolved with a query's filter, projection and
    /// expansions.
    ///
    /// # Errors
    ///
    /// See [`Context::query`].
    pub fn by_id(&self, query: &Query, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.query_engine().by_id(query, id)
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Applies a batch of raw links, direct ones first.
    ///
    /// No inverse links are derived: the batch is applied as given.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelation` if a link names a relation the schema does
    /// not declare for its type.
    pub fn update_links(&mut self, batch: &LinkBatch) -> CoreResult<()> {
        self.atomically(|ctx| {
            for link in batch.iter() {
                ctx.schema.relation(link.type_name.as_str(), &link.relation)?;
            }
            ctx.apply_links(batch);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Atomicity and journaled primitives
    // ------------------------------------------------------------------

    /// Runs `f` as one atomic call: on error every change it made is undone.
    pub(crate) fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        let outermost = self.journal.begin();
        match f(self) {
            Ok(value) => {
                self.journal.commit();
                Ok(value)
            }
            Err(err) if outermost => {
                let ops = self.journal.abort();
                debug!(undo = ops.len(), error = %err, "rolling back");
                for op in ops {
                    self.undo(op);
                }
                self.stats.record_rollback();
                Err(err)
            }
            Err(err) => {
                self.journal.commit();
                Err(err)
            }
        }
    }

    fn undo(&mut self, op: UndoOp) {
        match op {
            UndoOp::Entity {
                type_name,
                id,
                previous,
            } => {
                self.indexes.on_remove(type_name.as_str(), &id);
                if let Some((seq, entity)) = &previous {
                    self.indexes.on_insert(entity, *seq);
                }
                self.store.restore(&type_name, &id, previous);
            }
            UndoOp::Link {
                type_name,
                id,
                relation,
                previous,
            } => self.ledger.set_entry(&type_name, &relation, &id, previous),
            UndoOp::Tombstone {
                type_name,
                id,
                previous,
            } => self.set_tombstone_raw(&type_name, &id, previous),
        }
    }

    /// Stores a reconciled entity and re-indexes it.
    pub(crate) fn write_entity(&mut self, entity: Entity) {
        let type_name = entity.type_name().clone();
        let id = entity.id().clone();
        let previous = self.snapshot(&type_name, &id);
        self.journal.record(UndoOp::Entity {
            type_name: type_name.clone(),
            id: id.clone(),
            previous,
        });
        let (seq, _) = self.store.put(entity);
        if let Some(stored) = self.store.find(type_name.as_str(), &id) {
            self.indexes.on_insert(stored, seq);
        }
    }

    /// Moves a stored entity to another insertion sequence number.
    pub(crate) fn reseat_entity(&mut self, type_name: &TypeName, id: &EntityId, seq: SequenceNumber) {
        let Some((current, entity)) = self.snapshot(type_name, id) else {
            return;
        };
        if current == seq {
            return;
        }
        self.journal.record(UndoOp::Entity {
            type_name: type_name.clone(),
            id: id.clone(),
            previous: Some((current, entity.clone())),
        });
        self.indexes.on_remove(type_name.as_str(), id);
        self.indexes.on_insert(&entity, seq);
        self.store.restore(type_name, id, Some((seq, entity)));
    }

    /// Removes an entity from the indexes and the store.
    pub(crate) fn erase_entity(&mut self, type_name: &TypeName, id: &EntityId) -> Option<Entity> {
        let previous = self.snapshot(type_name, id)?;
        self.journal.record(UndoOp::Entity {
            type_name: type_name.clone(),
            id: id.clone(),
            previous: Some(previous),
        });
        self.indexes.on_remove(type_name.as_str(), id);
        self.stats.record_removal();
        self.store.remove(type_name.as_str(), id).map(|(_, entity)| entity)
    }

    fn snapshot(&self, type_name: &TypeName, id: &EntityId) -> Option<(SequenceNumber, Entity)> {
        let seq = self.store.seq_of(type_name.as_str(), id)?;
        self.store.find(type_name.as_str(), id).map(|e| (seq, e.clone()))
    }

    /// Applies a link batch to the ledger.
    pub(crate) fn apply_links(&mut self, batch: &LinkBatch) {
        if batch.is_empty() {
            return;
        }
        trace!(
            direct = batch.direct.len(),
            inverse = batch.inverse.len(),
            "applying link batch"
        );
        for link in batch.iter() {
            self.journal.record(UndoOp::Link {
                type_name: link.type_name.clone(),
                id: link.parent.clone(),
                relation: link.relation.clone(),
                previous: self
                    .ledger
                    .entry(link.type_name.as_str(), &link.relation, &link.parent)
                    .cloned(),
            });
            self.ledger.apply(link);
        }
    }

    /// Sets or clears a tombstone.
    pub(crate) fn set_tombstone(&mut self, type_name: &TypeName, id: &EntityId, tombstone: Option<Tombstone>) {
        let previous = self.tombstone(type_name.as_str(), id).cloned();
        if previous.is_none() && tombstone.is_none() {
            return;
        }
        self.journal.record(UndoOp::Tombstone {
            type_name: type_name.clone(),
            id: id.clone(),
            previous,
        });
        self.set_tombstone_raw(type_name, id, tombstone);
    }

    fn set_tombstone_raw(&mut self, type_name: &TypeName, id: &EntityId, tombstone: Option<Tombstone>) {
        match tombstone {
            Some(tombstone) => {
                self.tombstones
                    .entry(type_name.clone())
                    .or_default()
                    .insert(id.clone(), tombstone);
            }
            None => {
                if let Some(by_id) = self.tombstones.get_mut(type_name.as_str()) {
                    by_id.remove(id);
                    if by_id.is_empty() {
                        self.tombstones.remove(type_name.as_str());
                    }
                }
            }
        }
    }
}
