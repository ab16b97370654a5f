//! Planning of direct and inverse links for one relation write.

use std::collections::HashSet;

use super::{Link, LinkBatch, LinkOption, OrderedIdSet, RelationLedger};
use crate::entity::EntityId;
use crate::error::CoreResult;
use crate::schema::{Cardinality, RelationDef, Schema};
use crate::types::TypeName;

/// Plans the links that write `children` into `owner.def` of `parent`.
///
/// The plan is computed against the current ledger. For mutual relations
/// it also carries the inverse links keeping both sides symmetric: removed
/// children drop `parent` from their inverse, added children gain it, and
/// when the inverse is to-one an added child is first detached from any
/// other parent it had.
pub(crate) fn plan_links(
    ledger: &RelationLedger,
    schema: &Schema,
    owner: &TypeName,
    def: &RelationDef,
    parent: &EntityId,
    children: &[EntityId],
    option: LinkOption,
) -> CoreResult<LinkBatch> {
    let children: OrderedIdSet = children.iter().cloned().collect();
    let mut batch = LinkBatch::new().direct(Link::new(
        owner,
        parent,
        def.name.clone(),
        children.to_vec(),
        option,
    ));

    let Some(inverse_name) = def.inverse() else {
        return Ok(batch);
    };
    let inverse = schema.relation(def.target.as_str(), inverse_name)?;

    let old = ledger.children(owner.as_str(), &def.name, parent);
    let (added, removed): (Vec<EntityId>, Vec<EntityId>) = match option {
        LinkOption::Append => (
            children.iter().filter(|c| !old.contains(c)).cloned().collect(),
            Vec::new(),
        ),
        LinkOption::Replace => {
            let incoming: HashSet<&EntityId> = children.iter().collect();
            (
                children.iter().filter(|c| !old.contains(c)).cloned().collect(),
                old.iter().filter(|c| !incoming.contains(c)).cloned().collect(),
            )
        }
        LinkOption::Remove => (Vec::new(), children.to_vec()),
    };

    for child in removed {
        batch = batch.inverse(Link::new(
            &def.target,
            child,
            inverse_name,
            vec![parent.clone()],
            LinkOption::Remove,
        ));
    }

    for child in added {
        match inverse.cardinality {
            Cardinality::ToMany => {
                batch = batch.inverse(Link::new(
                    &def.target,
                    child,
                    inverse_name,
                    vec![parent.clone()],
                    LinkOption::Append,
                ));
            }
            Cardinality::ToOne => {
                let previous = ledger.children(def.target.as_str(), inverse_name, &child);
                for other in previous.iter().filter(|p| *p != parent) {
                    batch = batch.inverse(Link::new(
                        owner,
                        other.clone(),
                        def.name.clone(),
                        vec![child.clone()],
                        LinkOption::Remove,
                    ));
                }
                batch = batch.inverse(Link::new(
                    &def.target,
                    child,
                    inverse_name,
                    vec![parent.clone()],
                    LinkOption::Replace,
                ));
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntitySchema;

    fn schema() -> Schema {
        Schema::new()
            .with(
                EntitySchema::new("User")
                    .with_relation(RelationDef::to_many("chats", "Chat").mutual("users")),
            )
            .with(
                EntitySchema::new("Chat")
                    .with_relation(RelationDef::to_many("users", "User").mutual("chats"))
                    .with_relation(RelationDef::to_many("messages", "Message").mutual("chat")),
            )
            .with(
                EntitySchema::new("Message")
                    .with_relation(RelationDef::to_one("chat", "Chat").mutual("messages")),
            )
    }

    fn ids(list: &[&str]) -> Vec<EntityId> {
        list.iter().map(|s| EntityId::from(*s)).collect()
    }

    fn plan(
        ledger: &RelationLedger,
        owner: &str,
        relation: &str,
        parent: &str,
        children: &[&str],
        option: LinkOption,
    ) -> LinkBatch {
        let schema = schema();
        let def = schema.relation(owner, relation).unwrap().clone();
        plan_links(
            ledger,
            &schema,
            &TypeName::from(owner),
            &def,
            &EntityId::from(parent),
            &ids(children),
            option,
        )
        .unwrap()
    }

    #[test]
    fn one_way_has_no_inverse() {
        let schema = Schema::new()
            .with(EntitySchema::new("A").with_relation(RelationDef::to_many("bs", "B")))
            .with(EntitySchema::new("B"));
        let def = schema.relation("A", "bs").unwrap().clone();
        let batch = plan_links(
            &RelationLedger::new(),
            &schema,
            &TypeName::from("A"),
            &def,
            &EntityId::from("a"),
            &ids(&["b1", "b1"]),
            LinkOption::Replace,
        )
        .unwrap();
        assert_eq!(batch.direct.len(), 1);
        assert_eq!(batch.direct[0].children, ids(&["b1"]));
        assert!(batch.inverse.is_empty());
    }

    #[test]
    fn replace_mirrors_added_and_removed() {
        let mut ledger = RelationLedger::new();
        ledger.update_links(&plan(&ledger, "User", "chats", "u1", &["c1", "c2"], LinkOption::Append));

        let batch = plan(&ledger, "User", "chats", "u1", &["c2", "c3"], LinkOption::Replace);
        ledger.update_links(&batch);

        assert_eq!(ledger.children("User", "chats", &EntityId::from("u1")).to_vec(), ids(&["c2", "c3"]));
        assert!(ledger.children("Chat", "users", &EntityId::from("c1")).is_empty());
        assert_eq!(ledger.children("Chat", "users", &EntityId::from("c3")).to_vec(), ids(&["u1"]));
    }

    #[test]
    fn to_one_inverse_displaces_previous_parent() {
        let mut ledger = RelationLedger::new();
        ledger.update_links(&plan(&ledger, "Chat", "messages", "c1", &["m1"], LinkOption::Append));
        ledger.update_links(&plan(&ledger, "Chat", "messages", "c2", &["m1"], LinkOption::Append));

        assert!(ledger.children("Chat", "messages", &EntityId::from("c1")).is_empty());
        assert_eq!(ledger.children("Chat", "messages", &EntityId::from("c2")).to_vec(), ids(&["m1"]));
        assert_eq!(ledger.children("Message", "chat", &EntityId::from("m1")).to_vec(), ids(&["c2"]));
    }

    #[test]
    fn to_one_direct_moves_between_parents() {
        let mut ledger = RelationLedger::new();
        ledger.update_links(&plan(&ledger, "Message", "chat", "m1", &["c1"], LinkOption::Replace));
        ledger.update_links(&plan(&ledger, "Message", "chat", "m1", &["c2"], LinkOption::Replace));

        assert!(ledger.children("Chat", "messages", &EntityId::from("c1")).is_empty());
        assert_eq!(ledger.children("Chat", "messages", &EntityId::from("c2")).to_vec(), ids(&["m1"]));
    }

    #[test]
    fn remove_mirrors_inverse() {
        let mut ledger = RelationLedger::new();
        ledger.update_links(&plan(&ledger, "User", "chats", "u1", &["c1", "c2"], LinkOption::Append));
        ledger.update_links(&plan(&ledger, "User", "chats", "u1", &["c1"], LinkOption::Remove));

        assert_eq!(ledger.children("User", "chats", &EntityId::from("u1")).to_vec(), ids(&["c2"]));
        assert!(ledger.children("Chat", "users", &EntityId::from("c1")).is_empty());
    }
}
