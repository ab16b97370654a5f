//! The save path: merge, unique resolution, indexing and link planning.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::merge::MergeStrategy;
use crate::relation::{plan_links, LinkBatch, LinkOption};
use crate::schema::{CollisionPolicy, Survivor};
use crate::types::TypeName;

/// Entities already handled by the running top-level save.
type Visited = HashSet<(TypeName, EntityId)>;

impl Context {
    /// Saves an entity with its type's default merge strategy.
    ///
    /// Relation payloads are split off: inline related entities are saved
    /// (fragments patch what is stored), then links are replaced, appended
    /// or cleared as the payload says, inverse links included.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType`, `UnknownRelation`, `InvalidRelation` or
    /// `InvalidOperation` for entities the schema rejects, and
    /// `UniqueConstraintViolation` when a fail-policy unique key is taken.
    /// On error nothing is changed.
    pub fn save(&mut self, entity: Entity) -> CoreResult<()> {
        self.atomically(|ctx| ctx.save_entity(entity, None, &mut Visited::new()))
    }

    /// Saves an entity with an explicit merge strategy.
    ///
    /// # Errors
    ///
    /// See [`Context::save`].
    pub fn insert(&mut self, entity: Entity, strategy: &MergeStrategy) -> CoreResult<()> {
        self.atomically(|ctx| ctx.save_entity(entity, Some(strategy), &mut Visited::new()))
    }

    /// Saves an entity if there is one. Returns whether anything was saved.
    ///
    /// # Errors
    ///
    /// See [`Context::save`].
    pub fn insert_opt(&mut self, entity: Option<Entity>, strategy: &MergeStrategy) -> CoreResult<bool> {
        match entity {
            Some(entity) => self.insert(entity, strategy).map(|()| true),
            None => Ok(false),
        }
    }

    /// Saves several entities as one atomic call.
    ///
    /// Entities are merged in order as by repeated [`Context::insert`], so a
    /// later entity with an earlier id merges over it.
    ///
    /// # Errors
    ///
    /// See [`Context::save`]. A failure on any entity undoes them all.
    pub fn insert_all(&mut self, entities: Vec<Entity>, strategy: &MergeStrategy) -> CoreResult<()> {
        self.atomically(|ctx| {
            for entity in entities {
                ctx.save_entity(entity, Some(strategy), &mut Visited::new())?;
            }
            Ok(())
        })
    }

    pub(crate) fn save_entity(
        &mut self,
        mut entity: Entity,
        strategy: Option<&MergeStrategy>,
        visited: &mut Visited,
    ) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let type_name = entity.type_name().clone();
        let id = entity.id().clone();
        let entity_schema = schema.require(type_name.as_str())?;

        if !visited.insert((type_name.clone(), id.clone())) {
            return Ok(());
        }

        for (name, value) in entity.relations() {
            let def = entity_schema
                .relation(name)
                .ok_or_else(|| CoreError::unknown_relation(type_name.as_str(), name.as_str()))?;
            value.validate(type_name.as_str(), def)?;
        }
        for field in entity.fields().keys() {
            if field == "id" {
                return Err(CoreError::invalid_operation(format!(
                    "{type_name} {id}: \"id\" cannot be stored as a field"
                )));
            }
            if entity_schema.relation(field).is_some() {
                return Err(CoreError::invalid_operation(format!(
                    "{type_name} {id}: field {field} collides with a relation"
                )));
            }
        }

        let relations = entity.take_relations();

        let strategy = strategy.unwrap_or_else(|| entity_schema.merge_strategy());
        let merged = self.store.merged(&entity, strategy);
        if !self.resolve_unique(&merged)? {
            debug!(%type_name, %id, "save skipped by unique resolver");
            return Ok(());
        }
        self.set_tombstone(&type_name, &id, None);
        self.write_entity(merged);
        self.stats.record_save();
        debug!(%type_name, %id, "saved");

        let patch_all = MergeStrategy::PatchAll;
        let mut batch = LinkBatch::new();
        for def in entity_schema.relations() {
            let Some(value) = relations.get(&def.name) else {
                continue;
            };
            let Some(option) = value.link_option() else {
                continue;
            };
            let child_strategy = value.is_fragment().then_some(&patch_all);
            for child in value.inline_entities() {
                self.save_entity(child.clone(), child_strategy, visited)?;
            }
            let children = value.ids_referenced();
            batch.extend(plan_links(
                &self.ledger,
                &schema,
                &type_name,
                def,
                &id,
                &children,
                option,
            )?);
        }
        self.apply_links(&batch);
        Ok(())
    }

    /// Settles unique-key conflicts of an incoming value.
    ///
    /// Returns false when the incoming entity lost to a custom resolver; it
    /// is then evicted if stored and must not be saved.
    fn resolve_unique(&mut self, incoming: &Entity) -> CoreResult<bool> {
        let type_name = incoming.type_name().clone();
        for conflict in self.indexes.unique_conflicts(incoming) {
            match &conflict.policy {
                CollisionPolicy::Fail => {
                    return Err(CoreError::UniqueConstraintViolation {
                        type_name: type_name.to_string(),
                        index: conflict.index,
                        key: conflict.key.to_string(),
                        existing: conflict.holder.to_string(),
                        incoming: incoming.id().to_string(),
                    });
                }
                CollisionPolicy::Upsert => {
                    debug!(%type_name, index = %conflict.index, evicted = %conflict.holder, "unique upsert");
                    self.remove_entity(&type_name, &conflict.holder)?;
                }
                CollisionPolicy::Custom(resolver) => {
                    let Some(existing) = self.store.find(type_name.as_str(), &conflict.holder) else {
                        continue;
                    };
                    match resolver(existing, incoming) {
                        Survivor::Existing => {
                            debug!(%type_name, index = %conflict.index, kept = %conflict.holder, "incoming entity lost");
                            if self.store.contains(type_name.as_str(), incoming.id()) {
                                self.remove_entity(&type_name, incoming.id())?;
                            }
                            return Ok(false);
                        }
                        Survivor::Incoming => {
                            debug!(%type_name, index = %conflict.index, evicted = %conflict.holder, "existing entity lost");
                            self.remove_entity(&type_name, &conflict.holder)?;
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    /// Removes an entity from the store and indexes and detaches every link
    /// it has, in both directions for mutual relations.
    ///
    /// Returns the removed value.
    pub(crate) fn remove_entity(&mut self, type_name: &TypeName, id: &EntityId) -> CoreResult<Option<Entity>> {
        let removed = self.erase_entity(type_name, id);
        self.detach_all(type_name, id)?;
        Ok(removed)
    }

    pub(crate) fn detach_all(&mut self, type_name: &TypeName, id: &EntityId) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        for (relation, children) in self.ledger.relations_of(type_name.as_str(), id) {
            let def = schema.relation(type_name.as_str(), &relation)?;
            let batch = plan_links(
                &self.ledger,
                &schema,
                type_name,
                def,
                id,
                &children.to_vec(),
                LinkOption::Remove,
            )?;
            self.apply_links(&batch);
        }
        Ok(())
    }

    /// Removes one entity without applying delete rules: its links are
    /// detached, related entities stay. Returns the removed value.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelation` only if the ledger holds links the schema
    /// no longer declares.
    pub fn remove(&mut self, type_name: &str, id: &EntityId) -> CoreResult<Option<Entity>> {
        let type_name = TypeName::from(type_name);
        self.atomically(|ctx| ctx.remove_entity(&type_name, id))
    }

    /// Removes several entities without applying delete rules.
    ///
    /// # Errors
    ///
    /// See [`Context::remove`].
    pub fn remove_all(&mut self, type_name: &str, ids: &[EntityId]) -> CoreResult<Vec<Entity>> {
        let type_name = TypeName::from(type_name);
        self.atomically(|ctx| {
            let mut removed = Vec::new();
            for id in ids {
                removed.extend(ctx.remove_entity(&type_name, id)?);
            }
            Ok(removed)
        })
    }
}
