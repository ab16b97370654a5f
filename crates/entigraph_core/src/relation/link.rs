//! Link instructions applied to the relation ledger.

use crate::entity::EntityId;
use crate::types::TypeName;

/// How a link changes the stored child set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOption {
    /// Add children after the existing ones, skipping duplicates.
    Append,
    /// Replace the child set.
    Replace,
    /// Remove the listed children.
    Remove,
}

/// One change to the children of `(type_name, relation, parent)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Type of the parent entity.
    pub type_name: TypeName,
    /// Parent entity id.
    pub parent: EntityId,
    /// Relation name on the parent type.
    pub relation: String,
    /// Children affected by the change.
    pub children: Vec<EntityId>,
    /// Kind of change.
    pub option: LinkOption,
}

impl Link {
    /// Creates a link instruction.
    pub fn new(
        type_name: impl Into<TypeName>,
        parent: impl Into<EntityId>,
        relation: impl Into<String>,
        children: Vec<EntityId>,
        option: LinkOption,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            parent: parent.into(),
            relation: relation.into(),
            children,
            option,
        }
    }
}

/// A batch of links: direct links are applied before inverse links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBatch {
    /// Links on the relation being written.
    pub direct: Vec<Link>,
    /// Mirror links on mutual inverses.
    pub inverse: Vec<Link>,
}

impl LinkBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a direct link.
    #[must_use]
    pub fn direct(mut self, link: Link) -> Self {
        self.direct.push(link);
        self
    }

    /// Adds an inverse link.
    #[must_use]
    pub fn inverse(mut self, link: Link) -> Self {
        self.inverse.push(link);
        self
    }

    /// Appends another batch, keeping direct-before-inverse order.
    pub fn extend(&mut self, other: LinkBatch) {
        self.direct.extend(other.direct);
        self.inverse.extend(other.inverse);
    }

    /// Returns true if there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.inverse.is_empty()
    }

    /// All links in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.direct.iter().chain(self.inverse.iter())
    }
}
