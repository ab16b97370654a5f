//! Benchmark utilities: a message-board schema and random graphs over it.

use entigraph_core::{
    CollisionPolicy, Context, Entity, EntitySchema, IndexDef, RelationDef, RelationValue, Schema, SortOrder,
};
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "graph", "index", "merge", "cascade", "tombstone", "query", "ledger", "relation", "fragment", "chunk",
    "unique", "scan", "sort", "token", "restore", "detach",
];

/// Schema used by every benchmark.
///
/// `Board.posts` cascades to `Post.board`; posts carry a hash index on
/// `author`, a sort index on `score` and a full-text index on `body`.
#[must_use]
pub fn board_schema() -> Schema {
    Schema::new()
        .with(
            EntitySchema::new("Board")
                .with_relation(RelationDef::to_many("posts", "Post").mutual("board").cascade())
                .with_index(IndexDef::unique("by_slug", ["slug"], CollisionPolicy::Fail)),
        )
        .with(
            EntitySchema::new("Post")
                .with_relation(RelationDef::to_one("board", "Board").mutual("posts"))
                .with_index(IndexDef::hash("by_author", ["author"]))
                .with_index(IndexDef::sort("by_score", [("score", SortOrder::Descending)]))
                .with_index(IndexDef::full_text("body_text", ["body"])),
        )
}

/// Random text of `words` words.
pub fn random_body(rng: &mut impl Rng, words: usize) -> String {
    (0..words)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A post with random author, score and body.
pub fn random_post(rng: &mut impl Rng, id: usize, authors: usize) -> Entity {
    Entity::new("Post", format!("p{id}"))
        .with_field("author", format!("a{}", rng.gen_range(0..authors.max(1))))
        .with_field("score", rng.gen_range(0..1_000i64))
        .with_field("body", random_body(rng, 12))
}

/// A board carrying `posts` inline posts.
pub fn random_board(rng: &mut impl Rng, id: usize, posts: usize, authors: usize) -> Entity {
    let posts = (0..posts)
        .map(|n| random_post(rng, id * posts + n, authors))
        .collect();
    Entity::new("Board", format!("b{id}"))
        .with_field("slug", format!("board-{id}"))
        .with_relation("posts", RelationValue::entities(posts))
}

/// A context holding `boards` boards of `posts_per_board` posts each.
///
/// # Panics
///
/// Panics if the schema or a save is rejected.
#[must_use]
pub fn populated(boards: usize, posts_per_board: usize, authors: usize) -> Context {
    let mut rng = rand::thread_rng();
    let mut ctx = Context::new(board_schema()).expect("valid schema");
    for id in 0..boards {
        ctx.save(random_board(&mut rng, id, posts_per_board, authors))
            .expect("save board");
    }
    ctx
}
