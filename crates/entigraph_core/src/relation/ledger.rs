//! The adjacency ledger.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::{Link, LinkBatch, LinkOption, OrderedIdSet};
use crate::entity::EntityId;
use crate::types::TypeName;

type Adjacency = HashMap<EntityId, BTreeMap<String, OrderedIdSet>>;

/// Map from `(type, relation, id)` to the ordered set of related ids.
///
/// Empty sets are never stored.
#[derive(Debug, Default)]
pub struct RelationLedger {
    entries: HashMap<TypeName, Adjacency>,
}

impl RelationLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored child set, if any.
    #[must_use]
    pub fn entry(&self, type_name: &str, relation: &str, id: &EntityId) -> Option<&OrderedIdSet> {
        self.entries.get(type_name)?.get(id)?.get(relation)
    }

    /// Returns the children of a relation; empty if none are linked.
    #[must_use]
    pub fn children(&self, type_name: &str, relation: &str, id: &EntityId) -> OrderedIdSet {
        self.entry(type_name, relation, id).cloned().unwrap_or_default()
    }

    /// Lists every stored relation of an entity.
    #[must_use]
    pub fn relations_of(&self, type_name: &str, id: &EntityId) -> Vec<(String, OrderedIdSet)> {
        self.entries
            .get(type_name)
            .and_then(|adjacency| adjacency.get(id))
            .map(|relations| {
                relations
                    .iter()
                    .map(|(name, children)| (name.clone(), children.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrites one entry; `None` or an empty set removes it.
    pub fn set_entry(
        &mut self,
        type_name: &TypeName,
        relation: &str,
        id: &EntityId,
        children: Option<OrderedIdSet>,
    ) {
        match children {
            Some(children) if !children.is_empty() => {
                self.entries
                    .entry(type_name.clone())
                    .or_default()
                    .entry(id.clone())
                    .or_default()
                    .insert(relation.to_string(), children);
            }
            _ => self.clear(type_name.as_str(), relation, id),
        }
    }

    /// Removes all children of one relation.
    pub fn clear(&mut self, type_name: &str, relation: &str, id: &EntityId) {
        let Some(adjacency) = self.entries.get_mut(type_name) else {
            return;
        };
        if let Some(relations) = adjacency.get_mut(id) {
            relations.remove(relation);
            if relations.is_empty() {
                adjacency.remove(id);
            }
        }
        if adjacency.is_empty() {
            self.entries.remove(type_name);
        }
    }

    /// Applies one link.
    pub fn apply(&mut self, link: &Link) {
        let mut children = self
            .entry(link.type_name.as_str(), &link.relation, &link.parent)
            .cloned()
            .unwrap_or_default();
        match link.option {
            LinkOption::Append => children.extend(link.children.iter().cloned()),
            LinkOption::Replace => children = link.children.iter().cloned().collect(),
            LinkOption::Remove => {
                for child in &link.children {
                    children.remove(child);
                }
            }
        }
        self.set_entry(&link.type_name, &link.relation, &link.parent, Some(children));
    }

    /// Applies a batch: all direct links, then all inverse links.
    pub fn update_links(&mut self, batch: &LinkBatch) {
        trace!(
            direct = batch.direct.len(),
            inverse = batch.inverse.len(),
            "applying link batch"
        );
        for link in batch.iter() {
            self.apply(link);
        }
    }

    /// Total number of stored (parent, child) pairs.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(|adjacency| adjacency.values())
            .flat_map(|relations| relations.values())
            .map(OrderedIdSet::len)
            .sum()
    }

    /// Iterates over every stored entry as `(type, id, relation, children)`.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeName, &EntityId, &str, &OrderedIdSet)> {
        self.entries.iter().flat_map(|(type_name, adjacency)| {
            adjacency.iter().flat_map(move |(id, relations)| {
                relations
                    .iter()
                    .map(move |(name, children)| (type_name, id, name.as_str(), children))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn link(children: &[&str], option: LinkOption) -> Link {
        Link::new("User", "u1", "chats", children.iter().map(|c| id(c)).collect(), option)
    }

    fn chats(ledger: &RelationLedger) -> Vec<String> {
        ledger
            .children("User", "chats", &id("u1"))
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn append_preserves_order_and_skips_duplicates() {
        let mut ledger = RelationLedger::new();
        ledger.apply(&link(&["a", "b"], LinkOption::Append));
        ledger.apply(&link(&["b", "c"], LinkOption::Append));
        assert_eq!(chats(&ledger), vec!["a", "b", "c"]);
    }

    #[test]
    fn replace_and_remove() {
        let mut ledger = RelationLedger::new();
        ledger.apply(&link(&["a", "b"], LinkOption::Append));
        ledger.apply(&link(&["c"], LinkOption::Replace));
        assert_eq!(chats(&ledger), vec!["c"]);

        ledger.apply(&link(&["c"], LinkOption::Remove));
        assert!(chats(&ledger).is_empty());
        assert!(ledger.entry("User", "chats", &id("u1")).is_none());
        assert_eq!(ledger.link_count(), 0);
    }

    #[test]
    fn replace_with_empty_drops_entry() {
        let mut ledger = RelationLedger::new();
        ledger.apply(&link(&["a"], LinkOption::Append));
        ledger.apply(&link(&[], LinkOption::Replace));
        assert!(ledger.relations_of("User", &id("u1")).is_empty());
    }

    #[test]
    fn batch_applies_direct_before_inverse() {
        let mut ledger = RelationLedger::new();
        let batch = LinkBatch::new()
            .direct(link(&["c1"], LinkOption::Append))
            .inverse(Link::new("Chat", "c1", "users", vec![id("u1")], LinkOption::Append));
        ledger.update_links(&batch);

        assert_eq!(chats(&ledger), vec!["c1"]);
        assert_eq!(ledger.children("Chat", "users", &id("c1")).to_vec(), vec![id("u1")]);
        assert_eq!(ledger.iter().count(), 2);
    }

    #[test]
    fn relations_of_lists_all() {
        let mut ledger = RelationLedger::new();
        ledger.apply(&link(&["a"], LinkOption::Append));
        ledger.apply(&Link::new("User", "u1", "friends", vec![id("u2")], LinkOption::Append));
        let names: Vec<_> = ledger
            .relations_of("User", &id("u1"))
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["chats", "friends"]);
    }
}
