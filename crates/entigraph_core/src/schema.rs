//! Runtime schema descriptor.
//!
//! A [`Schema`] registers every entity type a context can hold: its
//! relations (target, cardinality, direction, required flag, delete rule),
//! its secondary indexes and its default merge strategy. The schema is
//! validated once, when the context is created.
//!
//! # Example
//!
//! ```rust,ignore
//! let schema = Schema::new()
//!     .with(
//!         EntitySchema::new("User")
//!             .with_relation(RelationDef::to_many("chats", "Chat").mutual("users"))
//!             .with_index(IndexDef::unique("by_username", ["username"], CollisionPolicy::Fail)),
//!     )
//!     .with(
//!         EntitySchema::new("Chat")
//!             .with_relation(RelationDef::to_many("users", "User").mutual("chats")),
//!     );
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::index::TokenizerConfig;
use crate::merge::MergeStrategy;
use crate::types::{SortOrder, TypeName};

/// Maximum number of key fields in a hash or unique index.
pub const MAX_KEY_FIELDS: usize = 4;

/// How many related entities a relation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related entity.
    ToOne,
    /// An ordered set of related entities.
    ToMany,
}

/// Whether links are mirrored on the target side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Links exist only on the declaring side.
    OneWay,
    /// Every link is mirrored by the named relation on the target type.
    Mutual {
        /// Name of the inverse relation on the target type.
        inverse: String,
    },
}

/// What deleting the owner does to related entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteRule {
    /// Related entities are deleted too.
    Cascade,
    /// Links are removed; related entities survive.
    #[default]
    Nullify,
}

/// Declaration of one relation on an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Relation name, unique within the declaring type.
    pub name: String,
    /// Type of related entities.
    pub target: TypeName,
    /// One or many.
    pub cardinality: Cardinality,
    /// One-way or mutual.
    pub direction: Direction,
    /// Whether saving may clear the relation.
    pub required: bool,
    /// Behavior on delete of the owner.
    pub delete_rule: DeleteRule,
}

impl RelationDef {
    fn new(name: impl Into<String>, target: impl Into<TypeName>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            direction: Direction::OneWay,
            required: false,
            delete_rule: DeleteRule::Nullify,
        }
    }

    /// Declares a one-way to-one relation.
    pub fn to_one(name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        Self::new(name, target, Cardinality::ToOne)
    }

    /// Declares a one-way to-many relation.
    pub fn to_many(name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        Self::new(name, target, Cardinality::ToMany)
    }

    /// Makes the relation mutual with the named inverse on the target.
    #[must_use]
    pub fn mutual(mut self, inverse: impl Into<String>) -> Self {
        self.direction = Direction::Mutual {
            inverse: inverse.into(),
        };
        self
    }

    /// Forbids clearing the relation on save.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Deletes related entities together with the owner.
    #[must_use]
    pub fn cascade(mut self) -> Self {
        self.delete_rule = DeleteRule::Cascade;
        self
    }

    /// Returns the inverse relation name for mutual relations.
    #[must_use]
    pub fn inverse(&self) -> Option<&str> {
        match &self.direction {
            Direction::Mutual { inverse } => Some(inverse),
            Direction::OneWay => None,
        }
    }

    /// Returns true for to-many relations.
    #[must_use]
    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }
}

/// Which side survives a unique-key collision under a custom policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survivor {
    /// The entity currently holding the key.
    Existing,
    /// The entity being saved.
    Incoming,
}

/// Resolver called with `(existing holder, incoming entity)`.
pub type UniqueResolver = Arc<dyn Fn(&Entity, &Entity) -> Survivor + Send + Sync>;

/// What a unique index does when a save claims a key already held by
/// another entity.
#[derive(Clone, Default)]
pub enum CollisionPolicy {
    /// Reject the save with a unique constraint violation.
    #[default]
    Fail,
    /// Evict the previous holder and let the incoming entity claim the key.
    Upsert,
    /// Ask a resolver which side survives; the loser is evicted.
    Custom(UniqueResolver),
}

impl CollisionPolicy {
    /// Creates a custom policy from a resolver function.
    pub fn custom<F>(resolver: F) -> Self
    where
        F: Fn(&Entity, &Entity) -> Survivor + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(resolver))
    }
}

impl fmt::Debug for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "Fail"),
            Self::Upsert => write!(f, "Upsert"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Kind-specific parameters of an index.
#[derive(Debug, Clone)]
pub enum IndexKind {
    /// Equality lookup; many entities per key.
    Hash,
    /// Equality lookup; at most one entity per key.
    Unique(CollisionPolicy),
    /// Ordered traversal; one direction per field.
    Sort(Vec<SortOrder>),
    /// Token postings over text fields.
    FullText(TokenizerConfig),
}

/// Declaration of one secondary index on an entity type.
#[derive(Debug, Clone)]
pub struct IndexDef {
    /// Index name, unique within the declaring type.
    pub name: String,
    /// Indexed fields, in key order.
    pub fields: Vec<String>,
    /// Index kind.
    pub kind: IndexKind,
}

impl IndexDef {
    /// Hash index over 1-4 fields.
    pub fn hash<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            kind: IndexKind::Hash,
        }
    }

    /// Unique index over 1-4 fields.
    pub fn unique<I, S>(name: impl Into<String>, fields: I, policy: CollisionPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            kind: IndexKind::Unique(policy),
        }
    }

    /// Sort index over comparator fields, each with its direction.
    pub fn sort<I, S>(name: impl Into<String>, comparators: I) -> Self
    where
        I: IntoIterator<Item = (S, SortOrder)>,
        S: Into<String>,
    {
        let (fields, orders): (Vec<String>, Vec<SortOrder>) = comparators
            .into_iter()
            .map(|(field, order)| (field.into(), order))
            .unzip();
        Self {
            name: name.into(),
            fields,
            kind: IndexKind::Sort(orders),
        }
    }

    /// Full-text index over text fields with the default tokenizer.
    pub fn full_text<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            kind: IndexKind::FullText(TokenizerConfig::default()),
        }
    }

    /// Replaces the tokenizer of a full-text index; no effect on other kinds.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        if let IndexKind::FullText(config) = &mut self.kind {
            *config = tokenizer;
        }
        self
    }

    fn validate(&self, type_name: &TypeName, relation_names: &HashSet<&str>) -> CoreResult<()> {
        let at = format!("index {}.{}", type_name, self.name);
        if self.fields.is_empty() {
            return Err(CoreError::invalid_schema(format!("{at} has no fields")));
        }
        match &self.kind {
            IndexKind::Hash | IndexKind::Unique(_) if self.fields.len() > MAX_KEY_FIELDS => {
                return Err(CoreError::invalid_schema(format!(
                    "{at} has {} key fields, at most {MAX_KEY_FIELDS} allowed",
                    self.fields.len()
                )));
            }
            IndexKind::Sort(orders) if orders.len() != self.fields.len() => {
                return Err(CoreError::invalid_schema(format!(
                    "{at} needs one direction per field"
                )));
            }
            _ => {}
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field == "id" || relation_names.contains(field.as_str()) {
                return Err(CoreError::invalid_schema(format!(
                    "{at} cannot index {field}: not a stored field"
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(CoreError::invalid_schema(format!(
                    "{at} lists {field} twice"
                )));
            }
        }
        Ok(())
    }
}

/// Registration of one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: TypeName,
    relations: Vec<RelationDef>,
    indexes: Vec<IndexDef>,
    merge: MergeStrategy,
}

impl EntitySchema {
    /// Starts a registration with no relations, no indexes and the replace
    /// merge strategy.
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            relations: Vec::new(),
            indexes: Vec::new(),
            merge: MergeStrategy::Replace,
        }
    }

    /// Declares a relation.
    #[must_use]
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Declares an index.
    #[must_use]
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the merge strategy used by `save`.
    #[must_use]
    pub fn with_merge(mut self, strategy: MergeStrategy) -> Self {
        self.merge = strategy;
        self
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// Relations in declaration order.
    #[must_use]
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Looks up a relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Indexes in declaration order.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Default merge strategy.
    #[must_use]
    pub fn merge_strategy(&self) -> &MergeStrategy {
        &self.merge
    }
}

/// The set of registered entity types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<TypeName, EntitySchema>,
    duplicates: Vec<TypeName>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    #[must_use]
    pub fn with(mut self, entity: EntitySchema) -> Self {
        self.register(entity);
        self
    }

    /// Registers an entity type in place.
    pub fn register(&mut self, entity: EntitySchema) {
        let name = entity.name.clone();
        if self.entities.insert(name.clone(), entity).is_some() {
            self.duplicates.push(name);
        }
    }

    /// Looks up a registered type.
    #[must_use]
    pub fn entity(&self, type_name: &str) -> Option<&EntitySchema> {
        self.entities.get(type_name)
    }

    /// Looks up a registered type, failing with `UnknownType`.
    pub fn require(&self, type_name: &str) -> CoreResult<&EntitySchema> {
        self.entity(type_name)
            .ok_or_else(|| CoreError::unknown_type(type_name))
    }

    /// Looks up a relation, failing with `UnknownType`/`UnknownRelation`.
    pub fn relation(&self, type_name: &str, relation: &str) -> CoreResult<&RelationDef> {
        self.require(type_name)?
            .relation(relation)
            .ok_or_else(|| CoreError::unknown_relation(type_name, relation))
    }

    /// Registered types in name order.
    pub fn types(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    /// Checks the schema for internal consistency.
    ///
    /// Relation and index names are unique per type, hash and unique
    /// indexes have 1-4 fields, relation targets are registered and every
    /// mutual relation's inverse exists and points back.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = self.duplicates.first() {
            return Err(CoreError::invalid_schema(format!(
                "type {name} registered twice"
            )));
        }

        for entity in self.entities.values() {
            let mut relation_names = HashSet::new();
            for relation in &entity.relations {
                if relation.name == "id" {
                    return Err(CoreError::invalid_schema(format!(
                        "{} cannot declare a relation named id",
                        entity.name
                    )));
                }
                if !relation_names.insert(relation.name.as_str()) {
                    return Err(CoreError::invalid_schema(format!(
                        "relation {}.{} declared twice",
                        entity.name, relation.name
                    )));
                }
                self.validate_relation(&entity.name, relation)?;
            }

            let mut index_names = HashSet::new();
            for index in &entity.indexes {
                if !index_names.insert(index.name.as_str()) {
                    return Err(CoreError::invalid_schema(format!(
                        "index {}.{} declared twice",
                        entity.name, index.name
                    )));
                }
                index.validate(&entity.name, &relation_names)?;
            }
        }
        Ok(())
    }

    fn validate_relation(&self, owner: &TypeName, relation: &RelationDef) -> CoreResult<()> {
        let Some(target) = self.entity(relation.target.as_str()) else {
            return Err(CoreError::invalid_schema(format!(
                "relation {}.{} targets unregistered type {}",
                owner, relation.name, relation.target
            )));
        };

        if let Some(inverse_name) = relation.inverse() {
            let Some(inverse) = target.relation(inverse_name) else {
                return Err(CoreError::invalid_schema(format!(
                    "relation {}.{} names missing inverse {}.{}",
                    owner, relation.name, relation.target, inverse_name
                )));
            };
            let points_back = inverse.target == *owner && inverse.inverse() == Some(relation.name.as_str());
            if !points_back {
                return Err(CoreError::invalid_schema(format!(
                    "inverse {}.{} does not point back to {}.{}",
                    relation.target, inverse_name, owner, relation.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_schema() -> Schema {
        Schema::new()
            .with(
                EntitySchema::new("User")
                    .with_relation(RelationDef::to_many("chats", "Chat").mutual("users"))
                    .with_index(IndexDef::unique("by_username", ["username"], CollisionPolicy::Fail)),
            )
            .with(
                EntitySchema::new("Chat")
                    .with_relation(RelationDef::to_many("users", "User").mutual("chats"))
                    .with_relation(RelationDef::to_many("messages", "Message").cascade()),
            )
            .with(EntitySchema::new("Message").with_relation(RelationDef::to_one("chat", "Chat")))
    }

    #[test]
    fn valid_schema_passes() {
        let schema = chat_schema();
        schema.validate().unwrap();
        assert_eq!(schema.types().count(), 3);
        assert!(schema.relation("Chat", "messages").is_ok());
    }

    #[test]
    fn introspection() {
        let schema = chat_schema();
        let user = schema.entity("User").unwrap();
        assert_eq!(user.relation("chats").unwrap().inverse(), Some("users"));
        assert!(user.index("by_username").is_some());
        assert!(matches!(
            schema.relation("User", "posts"),
            Err(CoreError::UnknownRelation { .. })
        ));
        assert!(matches!(
            schema.require("Ghost"),
            Err(CoreError::UnknownType { .. })
        ));
    }

    #[test]
    fn missing_inverse_rejected() {
        let schema = Schema::new()
            .with(EntitySchema::new("A").with_relation(RelationDef::to_many("bs", "B").mutual("as")))
            .with(EntitySchema::new("B"));
        assert!(matches!(
            schema.validate(),
            Err(CoreError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn inverse_must_point_back() {
        let schema = Schema::new()
            .with(EntitySchema::new("A").with_relation(RelationDef::to_many("bs", "B").mutual("as")))
            .with(EntitySchema::new("B").with_relation(RelationDef::to_many("as", "A")))
            .with(EntitySchema::new("C"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn unregistered_target_rejected() {
        let schema = Schema::new().with(EntitySchema::new("A").with_relation(RelationDef::to_one("b", "B")));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("unregistered"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let schema = Schema::new().with(
            EntitySchema::new("A")
                .with_relation(RelationDef::to_one("x", "A"))
                .with_relation(RelationDef::to_many("x", "A")),
        );
        assert!(schema.validate().is_err());

        let schema = Schema::new().with(
            EntitySchema::new("A")
                .with_index(IndexDef::hash("i", ["a"]))
                .with_index(IndexDef::hash("i", ["b"])),
        );
        assert!(schema.validate().is_err());

        let schema = Schema::new().with(EntitySchema::new("A")).with(EntitySchema::new("A"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn key_field_limits() {
        let too_many = Schema::new().with(
            EntitySchema::new("A").with_index(IndexDef::hash("i", ["a", "b", "c", "d", "e"])),
        );
        assert!(too_many.validate().is_err());

        let empty = Schema::new().with(EntitySchema::new("A").with_index(IndexDef::hash("i", Vec::<String>::new())));
        assert!(empty.validate().is_err());

        let four = Schema::new().with(
            EntitySchema::new("A").with_index(IndexDef::unique("i", ["a", "b", "c", "d"], CollisionPolicy::Upsert)),
        );
        four.validate().unwrap();
    }

    #[test]
    fn indexes_cannot_cover_relations() {
        let schema = Schema::new().with(
            EntitySchema::new("A")
                .with_relation(RelationDef::to_one("parent", "A"))
                .with_index(IndexDef::hash("by_parent", ["parent"])),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn sort_index_directions() {
        let def = IndexDef::sort("by_rank", [("rank", SortOrder::Descending), ("name", SortOrder::Ascending)]);
        assert_eq!(def.fields, vec!["rank".to_string(), "name".to_string()]);
        assert!(matches!(def.kind, IndexKind::Sort(ref o) if o.len() == 2));
    }
}
