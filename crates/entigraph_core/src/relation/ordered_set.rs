//! Insertion-ordered, deduplicated id set.

use std::collections::HashSet;
use std::fmt;

use crate::entity::EntityId;

/// Ordered set of entity ids.
///
/// Iteration follows first insertion; inserting a present id is a no-op.
#[derive(Clone, Default)]
pub struct OrderedIdSet {
    items: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl OrderedIdSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an id if absent. Returns true if it was added.
    pub fn insert(&mut self, id: EntityId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.items.push(id);
        true
    }

    /// Removes an id. Returns true if it was present.
    pub fn remove(&mut self, id: &EntityId) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        self.items.retain(|item| item != id);
        true
    }

    /// Returns true if the id is present.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.members.contains(id)
    }

    /// Number of ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityId> {
        self.items.iter()
    }

    /// First id, if any.
    #[must_use]
    pub fn first(&self) -> Option<&EntityId> {
        self.items.first()
    }

    /// The ids as a slice, in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.items
    }

    /// Copies the ids into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<EntityId> {
        self.items.clone()
    }
}

impl PartialEq for OrderedIdSet {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for OrderedIdSet {}

impl fmt::Debug for OrderedIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl FromIterator<EntityId> for OrderedIdSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl Extend<EntityId> for OrderedIdSet {
    fn extend<I: IntoIterator<Item = EntityId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl<'a> IntoIterator for &'a OrderedIdSet {
    type Item = &'a EntityId;
    type IntoIter = std::slice::Iter<'a, EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &OrderedIdSet) -> Vec<&str> {
        set.iter().map(EntityId::as_str).collect()
    }

    #[test]
    fn preserves_order_and_dedupes() {
        let set: OrderedIdSet = ["b", "a", "b", "c"].into_iter().map(EntityId::from).collect();
        assert_eq!(ids(&set), vec!["b", "a", "c"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn remove_keeps_order() {
        let mut set: OrderedIdSet = ["a", "b", "c"].into_iter().map(EntityId::from).collect();
        assert!(set.remove(&EntityId::from("b")));
        assert!(!set.remove(&EntityId::from("b")));
        assert_eq!(ids(&set), vec!["a", "c"]);

        set.insert(EntityId::from("b"));
        assert_eq!(ids(&set), vec!["a", "c", "b"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let ab: OrderedIdSet = ["a", "b"].into_iter().map(EntityId::from).collect();
        let ba: OrderedIdSet = ["b", "a"].into_iter().map(EntityId::from).collect();
        assert_ne!(ab, ba);
    }
}
