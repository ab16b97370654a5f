//! Relation payloads carried by entities.

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::schema::RelationDef;

use super::LinkOption;

/// The state of one relation on an entity being saved or returned by a
/// query.
///
/// `None` leaves stored links untouched. An empty, non-chunk id list
/// clears the relation. `chunk` payloads append instead of replacing, and
/// `fragment` payloads patch the related entities instead of overwriting
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RelationValue {
    /// Not specified.
    #[default]
    None,
    /// Reference to one related entity.
    SingleId(EntityId),
    /// One related entity carried inline.
    SingleEntity {
        /// The related entity.
        entity: Box<Entity>,
        /// Partial payload.
        fragment: bool,
    },
    /// References to related entities.
    IdList {
        /// Related ids, in order.
        ids: Vec<EntityId>,
        /// Append rather than replace.
        chunk: bool,
    },
    /// Related entities carried inline. Never empty.
    EntityList {
        /// The related entities, in order.
        entities: Vec<Entity>,
        /// Append rather than replace.
        chunk: bool,
        /// Partial payloads.
        fragment: bool,
    },
}

impl RelationValue {
    /// Reference to one entity.
    pub fn id(id: impl Into<EntityId>) -> Self {
        Self::SingleId(id.into())
    }

    /// Replacing list of references.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        Self::IdList {
            ids: ids.into_iter().map(Into::into).collect(),
            chunk: false,
        }
    }

    /// Appending list of references.
    pub fn chunk_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        Self::IdList {
            ids: ids.into_iter().map(Into::into).collect(),
            chunk: true,
        }
    }

    /// Explicit clear: an empty replacing list.
    #[must_use]
    pub fn cleared() -> Self {
        Self::IdList {
            ids: Vec::new(),
            chunk: false,
        }
    }

    /// One inline entity, stored wholesale.
    #[must_use]
    pub fn entity(entity: Entity) -> Self {
        Self::SingleEntity {
            entity: Box::new(entity),
            fragment: false,
        }
    }

    /// One inline partial entity.
    #[must_use]
    pub fn fragment(entity: Entity) -> Self {
        Self::SingleEntity {
            entity: Box::new(entity),
            fragment: true,
        }
    }

    /// Replacing list of inline entities.
    #[must_use]
    pub fn entities(entities: Vec<Entity>) -> Self {
        Self::entity_list(entities, false, false)
    }

    /// Appending list of inline entities.
    #[must_use]
    pub fn chunk(entities: Vec<Entity>) -> Self {
        Self::entity_list(entities, true, false)
    }

    /// Replacing list of inline partial entities.
    #[must_use]
    pub fn fragments(entities: Vec<Entity>) -> Self {
        Self::entity_list(entities, false, true)
    }

    /// Appending list of inline partial entities.
    #[must_use]
    pub fn fragment_chunk(entities: Vec<Entity>) -> Self {
        Self::entity_list(entities, true, true)
    }

    /// Builds an entity list; an empty one carries no payload and becomes
    /// an id list with the same `chunk` flag.
    #[must_use]
    pub fn entity_list(entities: Vec<Entity>, chunk: bool, fragment: bool) -> Self {
        if entities.is_empty() {
            Self::IdList {
                ids: Vec::new(),
                chunk,
            }
        } else {
            Self::EntityList {
                entities,
                chunk,
                fragment,
            }
        }
    }

    /// Returns true for the unspecified state.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns true for appending payloads.
    #[must_use]
    pub fn is_chunk(&self) -> bool {
        matches!(
            self,
            Self::IdList { chunk: true, .. } | Self::EntityList { chunk: true, .. }
        )
    }

    /// Returns true for partial entity payloads.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        matches!(
            self,
            Self::SingleEntity { fragment: true, .. } | Self::EntityList { fragment: true, .. }
        )
    }

    /// Ids referenced by the payload, in order.
    #[must_use]
    pub fn ids_referenced(&self) -> Vec<EntityId> {
        match self {
            Self::None => Vec::new(),
            Self::SingleId(id) => vec![id.clone()],
            Self::SingleEntity { entity, .. } => vec![entity.id().clone()],
            Self::IdList { ids, .. } => ids.clone(),
            Self::EntityList { entities, .. } => entities.iter().map(|e| e.id().clone()).collect(),
        }
    }

    /// Entities carried inline.
    #[must_use]
    pub fn inline_entities(&self) -> Vec<&Entity> {
        match self {
            Self::SingleEntity { entity, .. } => vec![entity.as_ref()],
            Self::EntityList { entities, .. } => entities.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The link option this payload applies, `None` when links stay as
    /// they are.
    #[must_use]
    pub fn link_option(&self) -> Option<LinkOption> {
        match self {
            Self::None => None,
            _ if self.is_chunk() => Some(LinkOption::Append),
            _ => Some(LinkOption::Replace),
        }
    }

    /// Checks the payload against its declaration.
    ///
    /// Chunks and multiple ids need a to-many relation, inline entities
    /// must have the target type and required relations cannot be cleared.
    pub fn validate(&self, owner: &str, def: &RelationDef) -> CoreResult<()> {
        let invalid = |message: &str| Err(CoreError::invalid_relation(owner, &def.name, message));

        if self.is_none() {
            return Ok(());
        }
        if self.is_chunk() && !def.is_to_many() {
            return invalid("chunk payloads need a to-many relation");
        }
        let referenced = self.ids_referenced();
        if !def.is_to_many() && referenced.len() > 1 {
            return invalid("a to-one relation holds at most one entity");
        }
        if def.required && !self.is_chunk() && referenced.is_empty() {
            return invalid("a required relation cannot be cleared");
        }
        for entity in self.inline_entities() {
            if entity.type_name() != &def.target {
                return Err(CoreError::invalid_relation(
                    owner,
                    &def.name,
                    format!(
                        "expected {} entities, got {}",
                        def.target,
                        entity.type_name()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_entity_list_is_canonical_id_list() {
        assert_eq!(RelationValue::entities(vec![]), RelationValue::cleared());
        assert_eq!(
            RelationValue::chunk(vec![]),
            RelationValue::IdList {
                ids: vec![],
                chunk: true
            }
        );
    }

    #[test]
    fn link_options() {
        assert_eq!(RelationValue::None.link_option(), None);
        assert_eq!(RelationValue::id("a").link_option(), Some(LinkOption::Replace));
        assert_eq!(
            RelationValue::chunk_ids(["a"]).link_option(),
            Some(LinkOption::Append)
        );
        assert_eq!(
            RelationValue::fragment_chunk(vec![Entity::new("T", "a")]).link_option(),
            Some(LinkOption::Append)
        );
    }

    #[test]
    fn referenced_ids() {
        let value = RelationValue::entities(vec![Entity::new("T", "a"), Entity::new("T", "b")]);
        let ids: Vec<_> = value.ids_referenced().into_iter().map(EntityId::into_string).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(RelationValue::None.ids_referenced().is_empty());
    }

    #[test]
    fn validation_rules() {
        let to_one = RelationDef::to_one("chat", "Chat");
        let to_many = RelationDef::to_many("users", "User");
        let required = RelationDef::to_one("chat", "Chat").required();

        assert!(RelationValue::id("c1").validate("Message", &to_one).is_ok());
        assert!(RelationValue::chunk_ids(["c1"]).validate("Message", &to_one).is_err());
        assert!(RelationValue::ids(["c1", "c2"]).validate("Message", &to_one).is_err());
        assert!(RelationValue::ids(["u1", "u2"]).validate("Chat", &to_many).is_ok());
        assert!(RelationValue::cleared().validate("Message", &required).is_err());
        assert!(RelationValue::None.validate("Message", &required).is_ok());

        let wrong_type = RelationValue::entity(Entity::new("User", "u1"));
        assert!(wrong_type.validate("Message", &to_one).is_err());
    }
}
