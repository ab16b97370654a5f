//! Delete rules, detach, soft delete and tombstones.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::entity::{Entity, EntityId};
use crate::error::CoreResult;
use crate::relation::{plan_links, LinkOption};
use crate::schema::DeleteRule;
use crate::types::{SequenceNumber, TypeName};

/// What remains of a soft-deleted entity until it is restored or purged.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    entity: Entity,
    links: Vec<(String, Vec<EntityId>)>,
    seq: SequenceNumber,
    deleted_at: SequenceNumber,
}

impl Tombstone {
    /// Last stored value.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Links of nullify-rule relations at deletion time, by relation.
    #[must_use]
    pub fn links(&self) -> &[(String, Vec<EntityId>)] {
        &self.links
    }

    /// Insertion sequence number of the entity, kept across a restore.
    #[must_use]
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Sequence number of the deletion.
    #[must_use]
    pub fn deleted_at(&self) -> SequenceNumber {
        self.deleted_at
    }
}

type Visited = HashSet<(TypeName, EntityId)>;

impl Context {
    /// Deletes an entity, applying each relation's delete rule.
    ///
    /// Soft or hard according to [`Config::default_soft_delete`](crate::Config).
    /// Returns whether the entity existed.
    ///
    /// # Errors
    ///
    /// Returns an error from a cascaded delete; nothing is deleted then.
    pub fn delete(&mut self, type_name: &str, id: &EntityId) -> CoreResult<bool> {
        let soft = self.config.default_soft_delete;
        self.delete_with(type_name, id, soft)
    }

    /// Deletes an entity without keeping a tombstone.
    ///
    /// Cascade-rule relations delete their children recursively;
    /// nullify-rule relations are detached.
    ///
    /// # Errors
    ///
    /// See [`Context::delete`].
    pub fn hard_delete(&mut self, type_name: &str, id: &EntityId) -> CoreResult<bool> {
        self.delete_with(type_name, id, false)
    }

    /// Deletes an entity and keeps a tombstone for it and for every
    /// cascaded child.
    ///
    /// # Errors
    ///
    /// See [`Context::delete`].
    pub fn soft_delete(&mut self, type_name: &str, id: &EntityId) -> CoreResult<bool> {
        self.delete_with(type_name, id, true)
    }

    /// Deletes several entities as one atomic call.
    ///
    /// # Errors
    ///
    /// See [`Context::delete`].
    pub fn delete_all(&mut self, type_name: &str, ids: &[EntityId]) -> CoreResult<usize> {
        let type_name = TypeName::from(type_name);
        let soft = self.config.default_soft_delete;
        self.atomically(|ctx| {
            let mut visited = Visited::new();
            let mut deleted = 0;
            for id in ids {
                if ctx.delete_entity(&type_name, id, soft, &mut visited)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    fn delete_with(&mut self, type_name: &str, id: &EntityId, soft: bool) -> CoreResult<bool> {
        let type_name = TypeName::from(type_name);
        self.atomically(|ctx| ctx.delete_entity(&type_name, id, soft, &mut Visited::new()))
    }

    fn delete_entity(&mut self, type_name: &TypeName, id: &EntityId, soft: bool, visited: &mut Visited) -> CoreResult<bool> {
        if !visited.insert((type_name.clone(), id.clone())) || !self.store.contains(type_name.as_str(), id) {
            return Ok(false);
        }
        let schema = Arc::clone(&self.schema);
        let entity_schema = schema.require(type_name.as_str())?;

        let mut links = Vec::new();
        let mut cascaded = Vec::new();
        for def in entity_schema.relations() {
            let children = self.ledger.children(type_name.as_str(), &def.name, id).to_vec();
            if children.is_empty() {
                continue;
            }
            match def.delete_rule {
                DeleteRule::Cascade => cascaded.push((def.target.clone(), children)),
                DeleteRule::Nullify => links.push((def.name.clone(), children)),
            }
        }

        for (target, children) in cascaded {
            for child in children {
                self.delete_entity(&target, &child, soft, visited)?;
            }
        }

        let Some(seq) = self.store.seq_of(type_name.as_str(), id) else {
            return Ok(false);
        };
        let Some(entity) = self.remove_entity(type_name, id)? else {
            return Ok(false);
        };
        if soft {
            let deleted_at = self.store.next_seq();
            self.set_tombstone(
                type_name,
                id,
                Some(Tombstone {
                    entity,
                    links,
                    seq,
                    deleted_at,
                }),
            );
        }
        debug!(%type_name, %id, soft, "deleted");
        Ok(true)
    }

    /// Removes the links from `id` to `children` in one relation, in both
    /// directions for mutual relations. The store is not touched.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` or `UnknownRelation` if the relation is not
    /// declared.
    pub fn detach(&mut self, type_name: &str, id: &EntityId, relation: &str, children: &[EntityId]) -> CoreResult<()> {
        let type_name = TypeName::from(type_name);
        self.atomically(|ctx| {
            let schema = Arc::clone(&ctx.schema);
            let def = schema.relation(type_name.as_str(), relation)?;
            let batch = plan_links(&ctx.ledger, &schema, &type_name, def, id, children, LinkOption::Remove)?;
            ctx.apply_links(&batch);
            Ok(())
        })
    }

    /// Brings back a soft-deleted entity through the save path and
    /// re-attaches its recorded links whose children still exist.
    ///
    /// The entity regains its original insertion sequence number, so
    /// iteration order and sort ties are as before the delete. Returns
    /// false when there is no tombstone, or when a custom unique resolver
    /// keeps the current key holder; the tombstone is kept then.
    ///
    /// # Errors
    ///
    /// Returns `UniqueConstraintViolation` if a fail-policy key of the
    /// tombstoned value is now held by another entity; the tombstone is
    /// kept then.
    pub fn restore(&mut self, type_name: &str, id: &EntityId) -> CoreResult<bool> {
        let type_name = TypeName::from(type_name);
        self.atomically(|ctx| {
            let Some(tombstone) = ctx.tombstone(type_name.as_str(), id).cloned() else {
                return Ok(false);
            };
            ctx.save_entity(tombstone.entity, None, &mut HashSet::new())?;
            if !ctx.store.contains(type_name.as_str(), id) {
                return Ok(false);
            }
            ctx.reseat_entity(&type_name, id, tombstone.seq);

            let schema = Arc::clone(&ctx.schema);
            for (relation, children) in tombstone.links {
                let def = schema.relation(type_name.as_str(), &relation)?;
                let existing: Vec<EntityId> = children
                    .into_iter()
                    .filter(|child| ctx.store.contains(def.target.as_str(), child))
                    .collect();
                if existing.is_empty() {
                    continue;
                }
                let batch = plan_links(&ctx.ledger, &schema, &type_name, def, id, &existing, LinkOption::Append)?;
                ctx.apply_links(&batch);
            }
            debug!(%type_name, %id, "restored");
            Ok(true)
        })
    }

    /// Discards a tombstone. Returns whether there was one.
    pub fn purge(&mut self, type_name: &str, id: &EntityId) -> bool {
        let type_name = TypeName::from(type_name);
        let existed = self.tombstone(type_name.as_str(), id).is_some();
        self.set_tombstone(&type_name, id, None);
        existed
    }
}
