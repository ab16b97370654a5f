//! End-to-end scenarios over a chat domain.

use entigraph_codec::Value;
use entigraph_core::{
    CollisionPolicy, Context, CoreError, Entity, EntityId, EntitySchema, IndexDef, IndexKey, Predicate, Query,
    RelationDef, RelationValue, Schema,
};

fn id(s: &str) -> EntityId {
    EntityId::from(s)
}

fn ids(list: &[&str]) -> Vec<EntityId> {
    list.iter().map(|s| EntityId::from(*s)).collect()
}

fn chat_schema(username_policy: CollisionPolicy) -> Schema {
    Schema::new()
        .with(
            EntitySchema::new("User")
                .with_relation(RelationDef::to_many("chats", "Chat").mutual("users"))
                .with_index(IndexDef::unique("by_username", ["username"], username_policy)),
        )
        .with(
            EntitySchema::new("Chat")
                .with_relation(RelationDef::to_many("users", "User").mutual("chats"))
                .with_relation(RelationDef::to_many("messages", "Message").mutual("chat").cascade()),
        )
        .with(
            EntitySchema::new("Message")
                .with_relation(RelationDef::to_one("chat", "Chat").mutual("messages"))
                .with_relation(RelationDef::to_many("attachments", "Attachment").cascade()),
        )
        .with(EntitySchema::new("Attachment"))
}

fn context() -> Context {
    Context::new(chat_schema(CollisionPolicy::Fail)).unwrap()
}

fn user(id: &str, username: &str) -> Entity {
    Entity::new("User", id).with_field("username", username)
}

#[test]
fn mutual_to_many_links_both_sides() {
    let mut ctx = context();
    ctx.save(user("bob", "@bob")).unwrap();
    ctx.save(user("alice", "@alice")).unwrap();
    ctx.save(Entity::new("Chat", "1").with_relation("users", RelationValue::ids(["bob", "alice"])))
        .unwrap();

    assert_eq!(ctx.get_children("User", "chats", &id("bob")), ids(&["1"]));
    assert_eq!(ctx.get_children("User", "chats", &id("alice")), ids(&["1"]));
    assert_eq!(ctx.get_children("Chat", "users", &id("1")), ids(&["bob", "alice"]));
}

#[test]
fn chunk_appends_in_order() {
    let mut ctx = context();
    ctx.save(Entity::new("Chat", "1").with_relation("users", RelationValue::ids(["bob", "alice"])))
        .unwrap();
    ctx.save(Entity::new("Chat", "1").with_relation("users", RelationValue::chunk_ids(["john", "michael"])))
        .unwrap();

    assert_eq!(
        ctx.get_children("Chat", "users", &id("1")),
        ids(&["bob", "alice", "john", "michael"])
    );
    assert_eq!(ctx.get_children("User", "chats", &id("john")), ids(&["1"]));
}

#[test]
fn replace_detaches_dropped_children() {
    let mut ctx = context();
    ctx.save(Entity::new("Chat", "1").with_relation("users", RelationValue::ids(["bob", "alice"])))
        .unwrap();
    ctx.save(Entity::new("Chat", "1").with_relation("users", RelationValue::ids(["john", "michael"])))
        .unwrap();

    assert!(ctx.get_children("User", "chats", &id("bob")).is_empty());
    assert!(ctx.get_children("User", "chats", &id("alice")).is_empty());
    assert_eq!(ctx.get_children("Chat", "users", &id("1")), ids(&["john", "michael"]));
}

#[test]
fn unique_fail_leaves_state_unchanged() {
    let mut ctx = context();
    ctx.save(user("1", "@bob")).unwrap();
    let before: Vec<Entity> = ctx.all("User").into_iter().cloned().collect();

    let err = ctx.save(user("2", "@bob")).unwrap_err();
    assert!(err.is_unique_violation(), "{err}");
    assert!(matches!(err, CoreError::UniqueConstraintViolation { ref existing, .. } if existing == "1"));

    let after: Vec<Entity> = ctx.all("User").into_iter().cloned().collect();
    assert_eq!(before, after);
    let key = IndexKey::from_values(vec![Value::from("@bob")]);
    assert_eq!(ctx.indexes().unique_holder("User", "by_username", &key), Some(&id("1")));
    assert_eq!(ctx.stats().rollbacks(), 1);
}

#[test]
fn unique_upsert_evicts_holder() {
    let mut ctx = Context::new(chat_schema(CollisionPolicy::Upsert)).unwrap();
    ctx.save(user("1", "@bob").with_relation("chats", RelationValue::ids(["c"])))
        .unwrap();
    ctx.save(user("2", "@bob")).unwrap();

    assert!(ctx.find("User", &id("1")).is_none());
    assert!(ctx.find("User", &id("2")).is_some());
    let key = IndexKey::from_values(vec![Value::from("@bob")]);
    assert_eq!(ctx.indexes().unique_holder("User", "by_username", &key), Some(&id("2")));
    assert!(ctx.get_children("Chat", "users", &id("c")).is_empty());
}

#[test]
fn unique_custom_resolver_picks_survivor() {
    use entigraph_core::Survivor;

    let policy = CollisionPolicy::custom(|existing: &Entity, incoming: &Entity| {
        if incoming.field("rank") > existing.field("rank") {
            Survivor::Incoming
        } else {
            Survivor::Existing
        }
    });
    let mut ctx = Context::new(chat_schema(policy)).unwrap();
    ctx.save(user("1", "@bob").with_field("rank", 5)).unwrap();

    ctx.save(user("2", "@bob").with_field("rank", 1)).unwrap();
    assert!(ctx.find("User", &id("2")).is_none());
    assert!(ctx.find("User", &id("1")).is_some());

    ctx.save(user("3", "@bob").with_field("rank", 9)).unwrap();
    assert!(ctx.find("User", &id("1")).is_none());
    assert!(ctx.find("User", &id("3")).is_some());
}

#[test]
fn null_unique_keys_are_not_claimed() {
    let mut ctx = context();
    ctx.save(Entity::new("User", "1")).unwrap();
    ctx.save(Entity::new("User", "2")).unwrap();
    assert_eq!(ctx.ids("User"), ids(&["1", "2"]));
}

#[test]
fn cascade_delete_spares_nullify_targets() {
    let mut ctx = context();
    ctx.save(user("bob", "@bob")).unwrap();
    ctx.save(
        Entity::new("Chat", "1")
            .with_relation("users", RelationValue::ids(["bob"]))
            .with_relation(
                "messages",
                RelationValue::entities(vec![Entity::new("Message", "1")
                    .with_field("body", "hi")
                    .with_relation("attachments", RelationValue::entities(vec![Entity::new("Attachment", "1")]))]),
            ),
    )
    .unwrap();
    assert!(ctx.find("Attachment", &id("1")).is_some());
    assert_eq!(ctx.get_children("Message", "chat", &id("1")), ids(&["1"]));

    assert!(ctx.delete("Chat", &id("1")).unwrap());

    assert!(ctx.find("Chat", &id("1")).is_none());
    assert!(ctx.find("Message", &id("1")).is_none());
    assert!(ctx.find("Attachment", &id("1")).is_none());
    assert!(ctx.find("User", &id("bob")).is_some());
    assert!(ctx.get_children("User", "chats", &id("bob")).is_empty());
    assert_eq!(ctx.ledger().link_count(), 0);
}

#[test]
fn delete_of_absent_entity_is_noop() {
    let mut ctx = context();
    assert!(!ctx.delete("Chat", &id("nope")).unwrap());
    assert!(!ctx.soft_delete("Chat", &id("nope")).unwrap());
    assert_eq!(ctx.stats().removals(), 0);
}

#[test]
fn hash_bucket_migration() {
    let schema = Schema::new().with(EntitySchema::new("Item").with_index(IndexDef::hash("by_category", ["category"])));
    let mut ctx = Context::new(schema).unwrap();
    ctx.save(Entity::new("Item", "x").with_field("category", "A")).unwrap();
    ctx.save(Entity::new("Item", "y").with_field("category", "A")).unwrap();
    ctx.save(Entity::new("Item", "z").with_field("category", "B")).unwrap();

    ctx.save(Entity::new("Item", "x").with_field("category", "B")).unwrap();

    let a = ctx.query_ids(&Query::new("Item").filter(Predicate::eq("category", "A"))).unwrap();
    let b = ctx.query_ids(&Query::new("Item").filter(Predicate::eq("category", "B"))).unwrap();
    assert_eq!(a, ids(&["y"]));
    assert_eq!(b, ids(&["x", "z"]));
    assert_eq!(ctx.stats().full_scans(), 0);
}
