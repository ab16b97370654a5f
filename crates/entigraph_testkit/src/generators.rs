//! Property-based test generators using proptest.
//!
//! Ids are drawn from small pools so generated operations collide: the same
//! entity is saved, linked, deleted and restored many times in one run.

use entigraph_codec::Value;
use entigraph_core::{Context, CoreResult, Entity, EntityId, Predicate, RelationValue};
use proptest::prelude::*;

const WORDS: &[&str] = &[
    "alpha", "beta", "Gamma", "release", "notes", "ship", "lunch", "deploy", "hello", "world",
];
const AUTHORS: &[&str] = &["ada", "bob", "cy", "dee"];

/// Strategy for an id `prefix0..prefix{pool-1}`.
pub fn pooled_id_strategy(prefix: &'static str, pool: usize) -> impl Strategy<Value = EntityId> {
    (0..pool).prop_map(move |n| EntityId::from(format!("{prefix}{n}")))
}

/// Strategy for scalar field values of every kind, null included.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(Value::Integer),
        prop::sample::select(WORDS).prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Value::Bytes),
    ]
}

/// Strategy for message bodies built from a small vocabulary.
pub fn body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..6).prop_map(|words| words.join(" "))
}

/// Strategy for a list of pooled ids.
pub fn id_list_strategy(prefix: &'static str, pool: usize) -> impl Strategy<Value = Vec<EntityId>> {
    prop::collection::vec(pooled_id_strategy(prefix, pool), 0..4)
}

/// Strategy for a to-many relation payload of ids: untouched, replace,
/// append or clear.
pub fn to_many_ids_strategy(prefix: &'static str, pool: usize) -> impl Strategy<Value = RelationValue> {
    prop_oneof![
        Just(RelationValue::None),
        id_list_strategy(prefix, pool).prop_map(RelationValue::ids),
        id_list_strategy(prefix, pool).prop_map(RelationValue::chunk_ids),
        Just(RelationValue::cleared()),
    ]
}

/// Strategy for users.
pub fn user_strategy() -> impl Strategy<Value = Entity> {
    (
        pooled_id_strategy("u", 5),
        prop::sample::select(AUTHORS),
        to_many_ids_strategy("c", 3),
    )
        .prop_map(|(id, name, chats)| {
            Entity::new("User", id)
                .with_field("name", name)
                .with_field("email", format!("{name}@example.com"))
                .with_relation("chats", chats)
        })
}

/// Strategy for attachments.
pub fn attachment_strategy() -> impl Strategy<Value = Entity> {
    (pooled_id_strategy("a", 6), prop::sample::select(&["image", "pdf", "audio"][..]))
        .prop_map(|(id, kind)| Entity::new("Attachment", id).with_field("kind", kind))
}

/// Strategy for messages, optionally carrying a chat link and inline
/// attachments.
pub fn message_strategy() -> impl Strategy<Value = Entity> {
    (
        pooled_id_strategy("m", 8),
        prop::sample::select(AUTHORS),
        body_strategy(),
        0i64..20,
        prop::option::of(pooled_id_strategy("c", 3)),
        prop::collection::vec(attachment_strategy(), 0..3),
        any::<bool>(),
    )
        .prop_map(|(id, author, body, sent_at, chat, attachments, fragment)| {
            let mut message = Entity::new("Message", id)
                .with_field("author", author)
                .with_field("body", body)
                .with_field("sent_at", sent_at);
            if let Some(chat) = chat {
                message.set_relation("chat", RelationValue::id(chat));
            }
            if !attachments.is_empty() {
                let payload = if fragment {
                    RelationValue::fragments(attachments)
                } else {
                    RelationValue::chunk(attachments)
                };
                message.set_relation("attachments", payload);
            }
            message
        })
}

/// Strategy for chats.
pub fn chat_strategy() -> impl Strategy<Value = Entity> {
    (
        pooled_id_strategy("c", 3),
        prop::option::of(prop::sample::select(WORDS)),
        to_many_ids_strategy("u", 5),
        to_many_ids_strategy("m", 8),
    )
        .prop_map(|(id, title, users, messages)| {
            let mut chat = Entity::new("Chat", id)
                .with_relation("users", users)
                .with_relation("messages", messages);
            if let Some(title) = title {
                chat.set_field("title", title);
            }
            chat
        })
}

/// One mutating call against the chat schema.
#[derive(Debug, Clone)]
pub enum GraphOp {
    /// `save`.
    Save(Entity),
    /// Hard `delete`.
    Delete(&'static str, EntityId),
    /// `soft_delete`.
    SoftDelete(&'static str, EntityId),
    /// `restore`.
    Restore(&'static str, EntityId),
    /// `detach` of users from a chat.
    DetachUsers(EntityId, Vec<EntityId>),
}

fn typed_id_strategy() -> impl Strategy<Value = (&'static str, EntityId)> {
    prop_oneof![
        pooled_id_strategy("u", 5).prop_map(|id| ("User", id)),
        pooled_id_strategy("c", 3).prop_map(|id| ("Chat", id)),
        pooled_id_strategy("m", 8).prop_map(|id| ("Message", id)),
        pooled_id_strategy("a", 6).prop_map(|id| ("Attachment", id)),
    ]
}

/// Strategy for graph operations, weighted toward saves.
pub fn graph_op_strategy() -> impl Strategy<Value = GraphOp> {
    prop_oneof![
        3 => user_strategy().prop_map(GraphOp::Save),
        3 => chat_strategy().prop_map(GraphOp::Save),
        4 => message_strategy().prop_map(GraphOp::Save),
        1 => typed_id_strategy().prop_map(|(t, id)| GraphOp::Delete(t, id)),
        1 => typed_id_strategy().prop_map(|(t, id)| GraphOp::SoftDelete(t, id)),
        1 => typed_id_strategy().prop_map(|(t, id)| GraphOp::Restore(t, id)),
        1 => (pooled_id_strategy("c", 3), id_list_strategy("u", 5))
            .prop_map(|(chat, users)| GraphOp::DetachUsers(chat, users)),
    ]
}

/// Strategy for predicates over message fields, nested up to two levels.
pub fn message_predicate_strategy() -> impl Strategy<Value = Predicate> {
    let leaf = prop_oneof![
        prop::sample::select(AUTHORS).prop_map(|a| Predicate::eq("author", a)),
        prop::sample::select(AUTHORS).prop_map(|a| Predicate::ne("author", a)),
        (0i64..20).prop_map(|t| Predicate::ge("sent_at", t)),
        (0i64..20).prop_map(|t| Predicate::lt("sent_at", t)),
        (0i64..20).prop_map(|t| Predicate::eq("sent_at", t)),
        prop::sample::select(WORDS).prop_map(|w| Predicate::contains("body", &w[1..])),
        prop::sample::select(WORDS).prop_map(|w| Predicate::contains_ignore_case("body", w.to_uppercase())),
        prop::sample::select(&["relese", "helo wrld", "gama", "x"][..]).prop_map(|q| Predicate::matches("body", q)),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Predicate::And),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Predicate::Or),
            inner.prop_map(Predicate::not),
        ]
    })
}

/// Applies an operation. Errors are returned, never panicked on.
pub fn apply_op(ctx: &mut Context, op: &GraphOp) -> CoreResult<()> {
    match op {
        GraphOp::Save(entity) => ctx.save(entity.clone()),
        GraphOp::Delete(type_name, id) => ctx.hard_delete(type_name, id).map(drop),
        GraphOp::SoftDelete(type_name, id) => ctx.soft_delete(type_name, id).map(drop),
        GraphOp::Restore(type_name, id) => ctx.restore(type_name, id).map(drop),
        GraphOp::DetachUsers(chat, users) => ctx.detach("Chat", chat, "users", users),
    }
}
