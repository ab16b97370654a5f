//! Merge-on-insert reconciliation.
//!
//! A [`MergeStrategy`] is a pure function `(old, new) -> merged` applied by
//! the store when an entity with an already stored id is inserted again.
//! Strategies compose with [`MergeStrategy::then`].
//!
//! # Example
//!
//! ```rust,ignore
//! // Keep the stored email when the update leaves it out, and only accept
//! // updates that are at least as recent.
//! let strategy = MergeStrategy::last_write_wins(
//!     vec![MergeStrategy::patch("email")],
//!     "updated_at",
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use entigraph_codec::Value;

use crate::entity::Entity;

/// Signature of a caller-supplied merge function.
pub type MergeFn = Arc<dyn Fn(&Entity, &Entity) -> Entity + Send + Sync>;

/// How a stored entity and an incoming one with the same id are reconciled.
#[derive(Clone, Default)]
pub enum MergeStrategy {
    /// The incoming value replaces the stored one.
    #[default]
    Replace,
    /// Keeps the stored value of one field when the incoming value is
    /// absent or null.
    Patch(String),
    /// Keeps every stored field the incoming value leaves absent or null.
    PatchAll,
    /// Concatenates array values of one field, stored first. Null counts as
    /// an empty array and a scalar as a one-element array.
    Append(String),
    /// The side with the larger `compared_by` value wins (ties go to the
    /// incoming side); `strategies` then merge the loser into the winner.
    /// The result keeps the larger comparator value.
    LastWriteWins {
        /// Strategies applied as `(loser, winner)`.
        strategies: Vec<MergeStrategy>,
        /// Field compared to pick the winner.
        compared_by: String,
    },
    /// Strategies applied in order, each on the previous result.
    Sequence(Vec<MergeStrategy>),
    /// Caller-supplied function.
    Custom(MergeFn),
}

impl MergeStrategy {
    /// Patch strategy for one field.
    pub fn patch(field: impl Into<String>) -> Self {
        Self::Patch(field.into())
    }

    /// Append strategy for one array field.
    pub fn append(field: impl Into<String>) -> Self {
        Self::Append(field.into())
    }

    /// Last-write-wins on `compared_by`, then `strategies`.
    pub fn last_write_wins(strategies: Vec<MergeStrategy>, compared_by: impl Into<String>) -> Self {
        Self::LastWriteWins {
            strategies,
            compared_by: compared_by.into(),
        }
    }

    /// Caller-supplied merge function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Entity, &Entity) -> Entity + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Composes two strategies: `self` runs first, `next` on its result.
    #[must_use]
    pub fn then(self, next: MergeStrategy) -> Self {
        match self {
            Self::Sequence(mut steps) => {
                steps.push(next);
                Self::Sequence(steps)
            }
            first => Self::Sequence(vec![first, next]),
        }
    }

    /// Reconciles a stored entity with an incoming one.
    #[must_use]
    pub fn merge(&self, old: &Entity, new: &Entity) -> Entity {
        match self {
            Self::Replace => new.clone(),
            Self::Patch(field) => {
                let mut merged = new.clone();
                if new.field(field).is_null() {
                    if let Some(kept) = old.get(field) {
                        merged.set_field(field.clone(), kept.clone());
                    }
                }
                merged
            }
            Self::PatchAll => {
                let mut merged = new.clone();
                for (name, value) in old.fields() {
                    if new.field(name).is_null() {
                        merged.set_field(name.clone(), value.clone());
                    }
                }
                merged
            }
            Self::Append(field) => {
                let mut items = as_items(old.field(field));
                items.extend(as_items(new.field(field)));
                let mut merged = new.clone();
                merged.set_field(field.clone(), Value::Array(items));
                merged
            }
            Self::LastWriteWins {
                strategies,
                compared_by,
            } => {
                let old_key = old.field(compared_by);
                let new_key = new.field(compared_by);
                let (winner, loser) = if old_key > new_key { (old, new) } else { (new, old) };

                let mut merged = winner.clone();
                for strategy in strategies {
                    merged = strategy.merge(loser, &merged);
                }
                let latest = if old_key > new_key { old_key } else { new_key };
                if !latest.is_null() {
                    merged.set_field(compared_by.clone(), latest.clone());
                }
                merged
            }
            Self::Sequence(steps) => {
                let mut merged = new.clone();
                for step in steps {
                    merged = step.merge(old, &merged);
                }
                merged
            }
            Self::Custom(f) => f(old, new),
        }
    }
}

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

impl fmt::Debug for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "Replace"),
            Self::Patch(field) => write!(f, "Patch({field})"),
            Self::PatchAll => write!(f, "PatchAll"),
            Self::Append(field) => write!(f, "Append({field})"),
            Self::LastWriteWins {
                strategies,
                compared_by,
            } => f
                .debug_struct("LastWriteWins")
                .field("strategies", strategies)
                .field("compared_by", compared_by)
                .finish(),
            Self::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: &[(&str, Value)]) -> Entity {
        let mut e = Entity::new("Doc", "d1");
        for (name, value) in fields {
            e.set_field(*name, value.clone());
        }
        e
    }

    #[test]
    fn replace_takes_new() {
        let old = doc(&[("a", 1.into()), ("b", 2.into())]);
        let new = doc(&[("a", 3.into())]);
        let merged = MergeStrategy::Replace.merge(&old, &new);
        assert_eq!(merged, new);
    }

    #[test]
    fn patch_keeps_old_when_absent_or_null() {
        let old = doc(&[("email", "a@x".into()), ("name", "A".into())]);

        let absent = doc(&[("name", "B".into())]);
        let merged = MergeStrategy::patch("email").merge(&old, &absent);
        assert_eq!(merged.field("email"), &Value::from("a@x"));
        assert_eq!(merged.field("name"), &Value::from("B"));

        let null = doc(&[("email", Value::Null)]);
        let merged = MergeStrategy::patch("email").merge(&old, &null);
        assert_eq!(merged.field("email"), &Value::from("a@x"));

        let set = doc(&[("email", "b@x".into())]);
        let merged = MergeStrategy::patch("email").merge(&old, &set);
        assert_eq!(merged.field("email"), &Value::from("b@x"));
    }

    #[test]
    fn patch_all_overlays_present_fields() {
        let old = doc(&[("a", 1.into()), ("b", 2.into())]);
        let new = doc(&[("b", 3.into())]);
        let merged = MergeStrategy::PatchAll.merge(&old, &new);
        assert_eq!(merged.field("a"), &Value::from(1));
        assert_eq!(merged.field("b"), &Value::from(3));
    }

    #[test]
    fn append_concatenates() {
        let old = doc(&[("tags", Value::Array(vec!["x".into()]))]);
        let new = doc(&[("tags", Value::Array(vec!["y".into()]))]);
        let merged = MergeStrategy::append("tags").merge(&old, &new);
        assert_eq!(
            merged.field("tags"),
            &Value::Array(vec!["x".into(), "y".into()])
        );

        // null is an empty array on either side
        let merged = MergeStrategy::append("tags").merge(&doc(&[]), &new);
        assert_eq!(merged.field("tags"), &Value::Array(vec!["y".into()]));
    }

    #[test]
    fn append_is_not_idempotent() {
        let old = doc(&[("tags", Value::Array(vec!["x".into()]))]);
        let strategy = MergeStrategy::append("tags");
        let once = strategy.merge(&old, &old);
        let twice = strategy.merge(&once, &old);
        assert_ne!(once, twice);
    }

    #[test]
    fn last_write_wins_picks_larger_comparator() {
        let old = doc(&[("v", 5.into()), ("name", "old".into())]);
        let new = doc(&[("v", 3.into()), ("name", "new".into())]);
        let strategy = MergeStrategy::last_write_wins(vec![], "v");

        let merged = strategy.merge(&old, &new);
        assert_eq!(merged.field("name"), &Value::from("old"));
        assert_eq!(merged.field("v"), &Value::from(5));

        let merged = strategy.merge(&new, &old);
        assert_eq!(merged.field("name"), &Value::from("old"));
    }

    #[test]
    fn last_write_wins_tie_goes_to_new() {
        let old = doc(&[("v", 1.into()), ("name", "old".into())]);
        let new = doc(&[("v", 1.into()), ("name", "new".into())]);
        let merged = MergeStrategy::last_write_wins(vec![], "v").merge(&old, &new);
        assert_eq!(merged.field("name"), &Value::from("new"));
    }

    #[test]
    fn last_write_wins_runs_substrategies_on_winner() {
        let old = doc(&[("v", 1.into()), ("email", "a@x".into())]);
        let new = doc(&[("v", 2.into())]);
        let strategy = MergeStrategy::last_write_wins(vec![MergeStrategy::patch("email")], "v");
        let merged = strategy.merge(&old, &new);
        assert_eq!(merged.field("email"), &Value::from("a@x"));
        assert_eq!(merged.field("v"), &Value::from(2));
    }

    #[test]
    fn composition_applies_in_order() {
        let old = doc(&[("a", 1.into()), ("tags", Value::Array(vec![1.into()]))]);
        let new = doc(&[("tags", Value::Array(vec![2.into()]))]);
        let strategy = MergeStrategy::patch("a").then(MergeStrategy::append("tags"));
        let merged = strategy.merge(&old, &new);
        assert_eq!(merged.field("a"), &Value::from(1));
        assert_eq!(
            merged.field("tags"),
            &Value::Array(vec![1.into(), 2.into()])
        );
    }

    #[test]
    fn custom_strategy() {
        let strategy = MergeStrategy::custom(|old, new| {
            let mut merged = new.clone();
            let total = old.field("n").as_integer().unwrap_or(0) + new.field("n").as_integer().unwrap_or(0);
            merged.set_field("n", total);
            merged
        });
        let merged = strategy.merge(&doc(&[("n", 2.into())]), &doc(&[("n", 3.into())]));
        assert_eq!(merged.field("n"), &Value::from(5));
        assert_eq!(format!("{:?}", strategy), "Custom(..)");
    }

    #[test]
    fn idempotent_strategies() {
        let e = doc(&[("v", 1.into()), ("email", "a@x".into())]);
        for strategy in [
            MergeStrategy::Replace,
            MergeStrategy::patch("email"),
            MergeStrategy::last_write_wins(vec![], "v"),
        ] {
            assert_eq!(strategy.merge(&e, &e), e);
        }
    }
}
