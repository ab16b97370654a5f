//! Model trait for typed collections.

use crate::entity::{Entity, EntityId};
use crate::error::CoreResult;

/// A Rust type stored as entities of one schema type.
///
/// Conversions must agree: `from_entity(&x.to_entity())` reproduces `x`.
///
/// # Example
///
/// ```rust,ignore
/// use entigraph_codec::CodecError;
/// use entigraph_core::{CoreError, CoreResult, Entity, EntityId, Model};
///
/// struct User {
///     id: EntityId,
///     name: String,
/// }
///
/// impl Model for User {
///     const TYPE_NAME: &'static str = "User";
///
///     fn id(&self) -> EntityId {
///         self.id.clone()
///     }
///
///     fn to_entity(&self) -> Entity {
///         Entity::new(Self::TYPE_NAME, self.id.clone()).with_field("name", self.name.as_str())
///     }
///
///     fn from_entity(entity: &Entity) -> CoreResult<Self> {
///         let name = entity
///             .field("name")
///             .as_text()
///             .ok_or_else(|| CoreError::Codec(CodecError::invalid_structure("User.name")))?;
///         Ok(User { id: entity.id().clone(), name: name.to_string() })
///     }
/// }
/// ```
pub trait Model: Sized {
    /// Schema type the model is stored as.
    const TYPE_NAME: &'static str;

    /// The entity id.
    fn id(&self) -> EntityId;

    /// Converts to an entity, relation payloads included if any.
    fn to_entity(&self) -> Entity;

    /// Converts from a stored entity.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing or has the wrong kind.
    fn from_entity(entity: &Entity) -> CoreResult<Self>;
}
