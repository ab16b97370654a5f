//! The dynamic entity record.

use std::collections::BTreeMap;

use entigraph_codec::Value;

use super::EntityId;
use crate::relation::RelationValue;
use crate::types::TypeName;

static NULL: Value = Value::Null;
static NO_RELATION: RelationValue = RelationValue::None;

/// A typed record: a type name, an id, scalar fields and relation payloads.
///
/// Relation payloads describe link changes to apply on save. Entities held
/// by the store never carry them; relation state lives in the ledger.
///
/// # Example
///
/// ```rust,ignore
/// let msg = Entity::new("Message", "m1")
///     .with_field("body", "hello")
///     .with_relation("chat", RelationValue::id("c1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    type_name: TypeName,
    id: EntityId,
    fields: BTreeMap<String, Value>,
    relations: BTreeMap<String, RelationValue>,
}

impl Entity {
    /// Creates an entity with no fields and no relations.
    pub fn new(type_name: impl Into<TypeName>, id: impl Into<EntityId>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets a relation payload.
    #[must_use]
    pub fn with_relation(mut self, name: impl Into<String>, value: RelationValue) -> Self {
        self.set_relation(name, value);
        self
    }

    /// Returns the entity type.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Returns a field value; missing fields read as [`Value::Null`].
    #[must_use]
    pub fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Returns a field value only if it is present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns all present fields.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Sets a field in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field, returning its previous value.
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns a relation payload; unspecified relations read as
    /// [`RelationValue::None`].
    #[must_use]
    pub fn relation(&self, name: &str) -> &RelationValue {
        self.relations.get(name).unwrap_or(&NO_RELATION)
    }

    /// Returns all relation payloads.
    #[must_use]
    pub fn relations(&self) -> &BTreeMap<String, RelationValue> {
        &self.relations
    }

    /// Sets a relation payload in place; [`RelationValue::None`] unsets it.
    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        let name = name.into();
        if value.is_none() {
            self.relations.remove(&name);
        } else {
            self.relations.insert(name, value);
        }
    }

    /// Returns true if any relation payload is set.
    #[must_use]
    pub fn has_relations(&self) -> bool {
        self.relations.values().any(|r| !r.is_none())
    }

    /// Splits off the relation payloads, leaving a normalized record.
    pub fn take_relations(&mut self) -> BTreeMap<String, RelationValue> {
        std::mem::take(&mut self.relations)
    }

    /// Returns a copy without relation payloads.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            id: self.id.clone(),
            fields: self.fields.clone(),
            relations: BTreeMap::new(),
        }
    }

    /// Keeps only the named fields. Relations are left untouched.
    #[must_use]
    pub fn project(mut self, fields: &[String]) -> Self {
        self.fields.retain(|name, _| fields.iter().any(|f| f == name));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_read_as_null() {
        let e = Entity::new("User", "u1").with_field("name", "Ada");
        assert_eq!(e.field("name"), &Value::from("Ada"));
        assert_eq!(e.field("age"), &Value::Null);
        assert!(e.get("age").is_none());
    }

    #[test]
    fn take_relations_normalizes() {
        let mut e = Entity::new("User", "u1").with_relation("chats", RelationValue::ids(["c1"]));
        assert!(e.has_relations());

        let taken = e.take_relations();
        assert_eq!(taken.len(), 1);
        assert!(!e.has_relations());
        assert!(e.relation("chats").is_none());
    }

    #[test]
    fn projection_keeps_selected_fields() {
        let e = Entity::new("User", "u1")
            .with_field("name", "Ada")
            .with_field("age", 36)
            .project(&["name".to_string()]);
        assert_eq!(e.fields().len(), 1);
        assert_eq!(e.id().as_str(), "u1");
    }
}
