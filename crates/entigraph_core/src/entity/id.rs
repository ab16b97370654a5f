//! Entity identifier.

use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identifier of an entity, unique within its type.
///
/// Ids are caller-chosen strings (natural keys such as a username work
/// fine). [`EntityId::generate`] mints a random one for callers without a
/// natural key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new random entity ID (hyphenated UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for EntityId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = EntityId::generate();
        let b = EntityId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn display_and_debug() {
        let id = EntityId::from("ada");
        assert_eq!(id.to_string(), "ada");
        assert_eq!(format!("{:?}", id), "EntityId(ada)");
    }

    #[test]
    fn ordering_is_textual() {
        let mut ids = vec![EntityId::from("b"), EntityId::from("a")];
        ids.sort();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
    }
}
