//! Entity types and storage.

mod id;
mod record;
mod store;

pub use id::EntityId;
pub use record::Entity;
pub use store::EntityStore;
