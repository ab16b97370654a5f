//! Graph-wide invariant checks.
//!
//! Each checker returns one line per violation so property tests can print
//! everything that broke at once.

use entigraph_core::{Context, Predicate, Query};

/// Mutual links whose inverse entry is missing.
pub fn link_symmetry_violations(ctx: &Context) -> Vec<String> {
    let mut violations = Vec::new();
    for (type_name, id, relation, children) in ctx.ledger().iter() {
        let Ok(def) = ctx.schema().relation(type_name.as_str(), relation) else {
            violations.push(format!("{type_name}.{relation} of {id}: undeclared relation"));
            continue;
        };
        let Some(inverse) = def.inverse() else {
            continue;
        };
        for child in children.iter() {
            let back = ctx.ledger().children(def.target.as_str(), inverse, child);
            if !back.contains(id) {
                violations.push(format!(
                    "{type_name}.{relation}: {id} -> {child} has no {}.{inverse} link back",
                    def.target
                ));
            }
        }
    }
    violations
}

/// Indexes whose contents differ from a rebuild over the store.
pub fn index_violations(ctx: &Context) -> Vec<String> {
    ctx.schema()
        .types()
        .flat_map(|entity| {
            ctx.indexes()
                .verify(entity.name().as_str(), ctx.store())
                .into_iter()
                .map(move |index| format!("{}.{index}: diverges from store", entity.name()))
        })
        .collect()
}

/// Stored entities that still carry relation payloads.
pub fn stored_relation_violations(ctx: &Context) -> Vec<String> {
    ctx.schema()
        .types()
        .flat_map(|entity| ctx.all(entity.name().as_str()))
        .filter(|stored| !stored.relations().is_empty())
        .map(|stored| format!("{} {}: stored with relation payloads", stored.type_name(), stored.id()))
        .collect()
}

/// Indexed query results that differ from scanned ones.
pub fn query_fidelity_violations(ctx: &Context, type_name: &str, predicates: &[Predicate]) -> Vec<String> {
    predicates
        .iter()
        .filter_map(|predicate| {
            let query = Query::new(type_name).filter(predicate.clone());
            let indexed = ctx.query_ids(&query);
            let scanned = ctx.query_ids(&query.clone().scan_only());
            match (indexed, scanned) {
                (Ok(indexed), Ok(scanned)) if indexed == scanned => None,
                (indexed, scanned) => Some(format!("{predicate:?}: indexed {indexed:?} != scanned {scanned:?}")),
            }
        })
        .collect()
}

/// A comparable dump of a context's observable state: every entity with
/// its sequence number, every ledger entry and every tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
    /// `(type, id, seq, entity)` in type then insertion order.
    pub entities: Vec<String>,
    /// `(type, id, relation, children)` sorted.
    pub links: Vec<String>,
    /// `(type, id, tombstone)` sorted.
    pub tombstones: Vec<String>,
}

/// Captures a [`GraphSnapshot`].
pub fn snapshot(ctx: &Context) -> GraphSnapshot {
    let mut entities = Vec::new();
    let mut tombstones = Vec::new();
    for entity_schema in ctx.schema().types() {
        let type_name = entity_schema.name().as_str();
        for stored in ctx.all(type_name) {
            let seq = ctx.store().seq_of(type_name, stored.id());
            entities.push(format!("{type_name} {} {seq:?} {stored:?}", stored.id()));
        }
        for tombstone in ctx.tombstones(type_name) {
            tombstones.push(format!("{type_name} {tombstone:?}"));
        }
    }
    let mut links: Vec<String> = ctx
        .ledger()
        .iter()
        .map(|(type_name, id, relation, children)| format!("{type_name} {id} {relation} {children:?}"))
        .collect();
    links.sort();
    tombstones.sort();
    GraphSnapshot {
        entities,
        links,
        tombstones,
    }
}

/// All structural violations.
pub fn check_invariants(ctx: &Context) -> Vec<String> {
    let mut violations = link_symmetry_violations(ctx);
    violations.extend(index_violations(ctx));
    violations.extend(stored_relation_violations(ctx));
    violations
}

/// Panics listing every structural violation.
pub fn assert_invariants(ctx: &Context) {
    let violations = check_invariants(ctx);
    assert!(violations.is_empty(), "invariants violated:\n{}", violations.join("\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chat, message, user, TestContext};
    use entigraph_core::{EntityId, Link, LinkBatch, LinkOption, RelationValue};

    #[test]
    fn test_clean_context() {
        let mut test_ctx = TestContext::chat();
        test_ctx
            .save(chat("c1", "ops").with_relation("users", RelationValue::entities(vec![user("u1", "Ada")])))
            .unwrap();
        assert!(check_invariants(&test_ctx).is_empty());
    }

    #[test]
    fn test_detects_one_sided_link() {
        let mut test_ctx = TestContext::chat();
        test_ctx.save(chat("c1", "ops")).unwrap();
        test_ctx.save(message("m1", "ada", "hi", 1)).unwrap();
        let batch = LinkBatch::new().direct(Link::new(
            "Chat",
            "c1",
            "messages",
            vec![EntityId::from("m1")],
            LinkOption::Append,
        ));
        test_ctx.update_links(&batch).unwrap();

        let violations = link_symmetry_violations(&test_ctx);
        assert_eq!(violations.len(), 1, "{violations:?}");
    }

    #[test]
    fn test_query_fidelity() {
        let mut test_ctx = TestContext::chat();
        test_ctx.save(message("m1", "ada", "hello there", 1)).unwrap();
        test_ctx.save(message("m2", "bob", "general kenobi", 2)).unwrap();
        let predicates = [Predicate::eq("author", "ada"), Predicate::contains("body", "ken")];
        assert!(query_fidelity_violations(&test_ctx, "Message", &predicates).is_empty());
    }
}
