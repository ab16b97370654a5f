//! Query descriptors.

use super::Predicate;
use crate::types::{SortOrder, TypeName};

/// How an expanded relation is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// Related ids only.
    Ids,
    /// Full nested resolution. A projection in the nested options makes
    /// the result a fragment.
    Full,
    /// Full nested resolution flagged as a fragment.
    Fragment,
}

/// Shape of one resolution step: filter, order, window, projection and
/// nested expansions.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Filter; `None` keeps every candidate.
    pub predicate: Option<Predicate>,
    /// Ordering comparators, left to right.
    pub sort: Vec<(String, SortOrder)>,
    /// Maximum number of results.
    pub limit: Option<i64>,
    /// Results to skip.
    pub offset: i64,
    /// Relations to expand on every result.
    pub expansions: Vec<Expansion>,
    /// Fields to keep; `None` keeps all.
    pub projection: Option<Vec<String>>,
    /// Allow index acceleration. Disabling it forces scans.
    pub use_indexes: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            predicate: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
            expansions: Vec::new(),
            projection: None,
            use_indexes: true,
        }
    }
}

impl QueryOptions {
    /// Options that match everything in insertion order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, AND-ed with any existing one.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Appends a sort comparator.
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    /// Appends an ascending comparator.
    #[must_use]
    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.sort_by(field, SortOrder::Ascending)
    }

    /// Appends a descending comparator.
    #[must_use]
    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.sort_by(field, SortOrder::Descending)
    }

    /// Sets the limit.
    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub const fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Adds a relation expansion.
    #[must_use]
    pub fn with(mut self, expansion: Expansion) -> Self {
        self.expansions.push(expansion);
        self
    }

    /// Keeps only the named fields.
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Disables index acceleration.
    #[must_use]
    pub const fn scan_only(mut self) -> Self {
        self.use_indexes = false;
        self
    }
}

/// A relation expansion with its own nested options.
///
/// # Example
///
/// ```rust,ignore
/// let latest = Expansion::full("messages")
///     .options(QueryOptions::new().sort_desc("sent_at").limit(20));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Relation name on the owning type.
    pub relation: String,
    /// Materialization mode.
    pub mode: ExpansionMode,
    /// Resolution applied to the related entities.
    pub options: QueryOptions,
}

impl Expansion {
    /// Creates an expansion.
    pub fn new(relation: impl Into<String>, mode: ExpansionMode) -> Self {
        Self {
            relation: relation.into(),
            mode,
            options: QueryOptions::default(),
        }
    }

    /// Expands to related ids.
    pub fn ids(relation: impl Into<String>) -> Self {
        Self::new(relation, ExpansionMode::Ids)
    }

    /// Expands to full related entities.
    pub fn full(relation: impl Into<String>) -> Self {
        Self::new(relation, ExpansionMode::Full)
    }

    /// Expands to fragment entities.
    pub fn fragment(relation: impl Into<String>) -> Self {
        Self::new(relation, ExpansionMode::Fragment)
    }

    /// Replaces the nested options.
    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// A query over one entity type.
///
/// # Example
///
/// ```rust,ignore
/// let query = Query::new("Message")
///     .filter(Predicate::eq("chat", "c1"))
///     .sort_desc("sent_at")
///     .limit(50)
///     .with(Expansion::ids("attachments"));
/// let messages = ctx.query(&query)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Queried type.
    pub type_name: TypeName,
    /// Resolution options.
    pub options: QueryOptions,
}

impl Query {
    /// A query matching every entity of `type_name`.
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            options: QueryOptions::default(),
        }
    }

    /// Replaces the options wholesale.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// See [`QueryOptions::filter`].
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.options = self.options.filter(predicate);
        self
    }

    /// See [`QueryOptions::sort_by`].
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.options = self.options.sort_by(field, order);
        self
    }

    /// See [`QueryOptions::sort_asc`].
    #[must_use]
    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.sort_by(field, SortOrder::Ascending)
    }

    /// See [`QueryOptions::sort_desc`].
    #[must_use]
    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.sort_by(field, SortOrder::Descending)
    }

    /// See [`QueryOptions::limit`].
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.options = self.options.limit(limit);
        self
    }

    /// See [`QueryOptions::offset`].
    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.options = self.options.offset(offset);
        self
    }

    /// See [`QueryOptions::with`].
    #[must_use]
    pub fn with(mut self, expansion: Expansion) -> Self {
        self.options = self.options.with(expansion);
        self
    }

    /// See [`QueryOptions::select`].
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.select(fields);
        self
    }

    /// See [`QueryOptions::scan_only`].
    #[must_use]
    pub fn scan_only(mut self) -> Self {
        self.options = self.options.scan_only();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_accumulate_as_and() {
        let query = Query::new("Message")
            .filter(Predicate::eq("a", 1))
            .filter(Predicate::eq("b", 2));
        assert_eq!(
            query.options.predicate,
            Some(Predicate::And(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]))
        );
    }

    #[test]
    fn defaults() {
        let query = Query::new("Chat");
        assert!(query.options.use_indexes);
        assert_eq!(query.options.offset, 0);
        assert!(query.options.limit.is_none());
        assert!(!query.scan_only().options.use_indexes);
    }

    #[test]
    fn expansion_builders() {
        let expansion = Expansion::fragment("users").options(QueryOptions::new().select(["name"]));
        assert_eq!(expansion.mode, ExpansionMode::Fragment);
        assert_eq!(expansion.options.projection, Some(vec!["name".to_string()]));
    }
}
