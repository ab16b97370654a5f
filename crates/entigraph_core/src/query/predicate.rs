//! Query predicates.

use entigraph_codec::Value;

use crate::entity::Entity;
use crate::index::{contains_text, fuzzy_matches, Comparison};

/// A boolean condition over an entity's fields.
///
/// # Example
///
/// ```rust,ignore
/// let recent_from_ada = Predicate::eq("author", "ada")
///     .and(Predicate::ge("sent_at", 1_700_000_000))
///     .and(Predicate::contains("body", "release").not());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field <op> value` for `==`, `<`, `<=`, `>`, `>=`.
    Compare {
        /// Field name.
        field: String,
        /// Operator.
        op: Comparison,
        /// Operand.
        value: Value,
    },
    /// `field != value`.
    Ne {
        /// Field name.
        field: String,
        /// Operand.
        value: Value,
    },
    /// Substring match on a text field.
    Contains {
        /// Field name.
        field: String,
        /// Substring to look for.
        pattern: String,
        /// Compare case-insensitively.
        case_insensitive: bool,
    },
    /// Fuzzy token match on a text field.
    Matches {
        /// Field name.
        field: String,
        /// Query text.
        query: String,
    },
    /// All clauses hold; true when empty.
    And(Vec<Predicate>),
    /// Any clause holds; false when empty.
    Or(Vec<Predicate>),
    /// The clause does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// `field != value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    /// `field <= value`.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    /// `field >= value`.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    /// Case-sensitive substring match.
    pub fn contains(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// Case-insensitive substring match.
    pub fn contains_ignore_case(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    /// Fuzzy token match.
    pub fn matches(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Matches {
            field: field.into(),
            query: query.into(),
        }
    }

    /// Conjunction with another predicate, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut clauses) => {
                clauses.push(other);
                Self::And(clauses)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction with another predicate, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut clauses) => {
                clauses.push(other);
                Self::Or(clauses)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates the predicate against one entity.
    ///
    /// This is the reference semantics: index-accelerated resolution must
    /// return exactly the entities for which this returns true.
    #[must_use]
    pub fn evaluate(&self, entity: &Entity, fuzzy_threshold: f64) -> bool {
        match self {
            Self::Compare { field, op, value } => op.holds(entity.field(field), value),
            Self::Ne { field, value } => entity.field(field) != value,
            Self::Contains {
                field,
                pattern,
                case_insensitive,
            } => entity
                .field(field)
                .as_text()
                .is_some_and(|text| contains_text(text, pattern, *case_insensitive)),
            Self::Matches { field, query } => entity
                .field(field)
                .as_text()
                .is_some_and(|text| fuzzy_matches(text, query, fuzzy_threshold)),
            Self::And(clauses) => clauses.iter().all(|c| c.evaluate(entity, fuzzy_threshold)),
            Self::Or(clauses) => clauses.iter().any(|c| c.evaluate(entity, fuzzy_threshold)),
            Self::Not(inner) => !inner.evaluate(entity, fuzzy_threshold),
        }
    }
}
