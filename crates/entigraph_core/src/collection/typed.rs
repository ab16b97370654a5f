//! Typed collection implementation.

use std::marker::PhantomData;

use super::Model;
use crate::context::Context;
use crate::entity::EntityId;
use crate::error::CoreResult;
use crate::query::{Query, QueryOptions};

/// A typed view of the entities of one type.
///
/// # Example
///
/// ```rust,ignore
/// let mut users = ctx.collection::<User>();
///
/// users.put(&User { id: "u1".into(), name: "Ada".into() })?;
/// let ada = users.get(&"u1".into())?;
///
/// let named = users.fetch(QueryOptions::new().sort_asc("name").limit(10))?;
/// ```
pub struct Collection<'a, T: Model> {
    ctx: &'a mut Context,
    _marker: PhantomData<T>,
}

impl<'a, T: Model> Collection<'a, T> {
    pub(crate) fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            _marker: PhantomData,
        }
    }

    /// Returns the schema type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    /// Saves a model with its type's default merge strategy.
    ///
    /// # Errors
    ///
    /// See [`Context::save`].
    pub fn put(&mut self, model: &T) -> CoreResult<()> {
        self.ctx.save(model.to_entity())
    }

    /// Gets a model by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored entity does not convert.
    pub fn get(&self, id: &EntityId) -> CoreResult<Option<T>> {
        self.ctx.find(T::TYPE_NAME, id).map(T::from_entity).transpose()
    }

    /// All models in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored entity does not convert.
    pub fn all(&self) -> CoreResult<Vec<T>> {
        self.ctx.all(T::TYPE_NAME).into_iter().map(T::from_entity).collect()
    }

    /// Models matching query options.
    ///
    /// # Errors
    ///
    /// See [`Context::query`]; also fails if a result does not convert.
    pub fn fetch(&self, options: QueryOptions) -> CoreResult<Vec<T>> {
        let query = Query::new(T::TYPE_NAME).with_options(options);
        self.ctx.query(&query)?.iter().map(T::from_entity).collect()
    }

    /// Number of stored models.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ctx.store().count(T::TYPE_NAME)
    }

    /// Deletes a model by id, applying delete rules.
    ///
    /// # Errors
    ///
    /// See [`Context::delete`].
    pub fn delete(&mut self, id: &EntityId) -> CoreResult<bool> {
        self.ctx.delete(T::TYPE_NAME, id)
    }
}

impl Context {
    /// Typed view of the entities of `T::TYPE_NAME`.
    pub fn collection<T: Model>(&mut self) -> Collection<'_, T> {
        Collection::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::error::CoreError;
    use crate::schema::{EntitySchema, Schema};
    use entigraph_codec::CodecError;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: EntityId,
        text: String,
        rank: i64,
    }

    impl Model for Note {
        const TYPE_NAME: &'static str = "Note";

        fn id(&self) -> EntityId {
            self.id.clone()
        }

        fn to_entity(&self) -> Entity {
            Entity::new(Self::TYPE_NAME, self.id.clone())
                .with_field("text", self.text.as_str())
                .with_field("rank", self.rank)
        }

        fn from_entity(entity: &Entity) -> CoreResult<Self> {
            let missing = |field: &str| CoreError::Codec(CodecError::invalid_structure(format!("Note.{field}")));
            Ok(Self {
                id: entity.id().clone(),
                text: entity.field("text").as_text().ok_or_else(|| missing("text"))?.to_string(),
                rank: entity.field("rank").as_integer().ok_or_else(|| missing("rank"))?,
            })
        }
    }

    fn note(id: &str, rank: i64) -> Note {
        Note {
            id: id.into(),
            text: format!("note {id}"),
            rank,
        }
    }

    #[test]
    fn put_get_delete() {
        let mut ctx = Context::new(Schema::new().with(EntitySchema::new("Note"))).unwrap();
        let mut notes = ctx.collection::<Note>();
        notes.put(&note("a", 2)).unwrap();
        notes.put(&note("b", 1)).unwrap();

        assert_eq!(notes.get(&"a".into()).unwrap(), Some(note("a", 2)));
        assert_eq!(notes.count(), 2);
        assert_eq!(notes.all().unwrap().len(), 2);

        let ranked = notes.fetch(QueryOptions::new().sort_asc("rank")).unwrap();
        assert_eq!(ranked, vec![note("b", 1), note("a", 2)]);

        assert!(notes.delete(&"a".into()).unwrap());
        assert_eq!(notes.get(&"a".into()).unwrap(), None);
    }

    #[test]
    fn conversion_errors_surface() {
        let mut ctx = Context::new(Schema::new().with(EntitySchema::new("Note"))).unwrap();
        ctx.save(Entity::new("Note", "x").with_field("text", "no rank")).unwrap();
        assert!(ctx.collection::<Note>().get(&"x".into()).is_err());
    }
}
