//! Test fixtures and context helpers.
//!
//! The chat schema used across tests:
//!
//! - `User.chats` (to-many) <-> `Chat.users` (to-many), nullify
//! - `Chat.messages` (to-many, cascade) <-> `Message.chat` (to-one)
//! - `Message.attachments` (to-many, cascade, one-way) -> `Attachment`
//!
//! with a unique `email` index on users, author/time/body indexes on
//! messages and a kind index on attachments.

use entigraph_core::{
    CollisionPolicy, Config, Context, Entity, EntitySchema, IndexDef, MergeStrategy, RelationDef, RelationValue,
    Schema, SortOrder,
};

/// Builds the chat schema.
pub fn chat_schema() -> Schema {
    chat_schema_with(CollisionPolicy::Fail)
}

/// Builds the chat schema with a given policy on the user email index.
pub fn chat_schema_with(email_policy: CollisionPolicy) -> Schema {
    Schema::new()
        .with(
            EntitySchema::new("User")
                .with_relation(RelationDef::to_many("chats", "Chat").mutual("users"))
                .with_index(IndexDef::unique("by_email", ["email"], email_policy))
                .with_index(IndexDef::hash("by_name", ["name"])),
        )
        .with(
            EntitySchema::new("Chat")
                .with_relation(RelationDef::to_many("users", "User").mutual("chats"))
                .with_relation(RelationDef::to_many("messages", "Message").mutual("chat").cascade())
                .with_index(IndexDef::sort("by_title", [("title", SortOrder::Ascending)]))
                .with_merge(MergeStrategy::patch("title")),
        )
        .with(
            EntitySchema::new("Message")
                .with_relation(RelationDef::to_one("chat", "Chat").mutual("messages"))
                .with_relation(RelationDef::to_many("attachments", "Attachment").cascade())
                .with_index(IndexDef::hash("by_author", ["author"]))
                .with_index(IndexDef::sort(
                    "by_sent",
                    [("sent_at", SortOrder::Descending), ("author", SortOrder::Ascending)],
                ))
                .with_index(IndexDef::full_text("body_text", ["body"])),
        )
        .with(EntitySchema::new("Attachment").with_index(IndexDef::hash("by_kind", ["kind"])))
}

/// A context over the chat schema.
pub struct TestContext {
    /// The context instance.
    pub ctx: Context,
}

impl TestContext {
    /// Creates an empty chat context.
    pub fn chat() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty chat context with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self::from_schema(chat_schema(), config)
    }

    /// Creates an empty context over any schema.
    pub fn from_schema(schema: Schema, config: Config) -> Self {
        Self {
            ctx: Context::with_config(schema, config).expect("fixture schema must validate"),
        }
    }
}

impl std::ops::Deref for TestContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl std::ops::DerefMut for TestContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

/// Runs a test with a fresh chat context.
///
/// # Example
///
/// ```rust,ignore
/// with_chat_context(|ctx| {
///     ctx.save(user("u1", "Ada")).unwrap();
/// });
/// ```
pub fn with_chat_context<F, R>(f: F) -> R
where
    F: FnOnce(&mut Context) -> R,
{
    let mut test_ctx = TestContext::chat();
    f(&mut test_ctx.ctx)
}

/// A user with a derived email.
pub fn user(id: &str, name: &str) -> Entity {
    Entity::new("User", id)
        .with_field("name", name)
        .with_field("email", format!("{}@example.com", name.to_lowercase()))
}

/// A chat.
pub fn chat(id: &str, title: &str) -> Entity {
    Entity::new("Chat", id).with_field("title", title)
}

/// A message.
pub fn message(id: &str, author: &str, body: &str, sent_at: i64) -> Entity {
    Entity::new("Message", id)
        .with_field("author", author)
        .with_field("body", body)
        .with_field("sent_at", sent_at)
}

/// An attachment.
pub fn attachment(id: &str, kind: &str) -> Entity {
    Entity::new("Attachment", id).with_field("kind", kind)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A context with `chats` chats shared by `users` users, each chat
    /// holding `messages_per_chat` messages with one attachment each.
    pub fn populated_chat(users: usize, chats: usize, messages_per_chat: usize) -> TestContext {
        let mut test_ctx = TestContext::chat();
        for u in 0..users {
            test_ctx
                .save(user(&format!("u{u}"), &format!("user{u}")))
                .expect("Failed to save user");
        }
        let user_ids: Vec<String> = (0..users).map(|u| format!("u{u}")).collect();
        for c in 0..chats {
            let messages = (0..messages_per_chat)
                .map(|m| {
                    let id = format!("c{c}m{m}");
                    let author = format!("user{}", m % users.max(1));
                    message(&id, &author, &format!("message {m} in chat {c}"), (c * messages_per_chat + m) as i64)
                        .with_relation("attachments", RelationValue::entities(vec![attachment(&format!("{id}a"), "image")]))
                })
                .collect();
            test_ctx
                .save(
                    chat(&format!("c{c}"), &format!("chat {c}"))
                        .with_relation("users", RelationValue::ids(user_ids.iter().map(String::as_str)))
                        .with_relation("messages", RelationValue::entities(messages)),
                )
                .expect("Failed to save chat");
        }
        test_ctx
    }
}
