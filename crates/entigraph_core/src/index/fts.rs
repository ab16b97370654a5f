//! Full-text index implementation.
//!
//! The `FtsIndex` keeps token postings for one or more text fields and
//! narrows two predicates:
//! - `contains`: substring match, narrowed through tokens containing the
//!   longest separator-free run of the pattern and verified against the
//!   raw field, so answers equal a linear substring scan
//! - `matches`: fuzzy token match (prefix or normalized Levenshtein
//!   similarity above a threshold)

use std::collections::{HashMap, HashSet};

use entigraph_codec::Value;

use crate::entity::{Entity, EntityId};
use crate::index::traits::SecondaryIndex;
use crate::schema::{IndexDef, IndexKind};
use crate::types::SequenceNumber;

/// Configuration for the FTS tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Whether tokens are lowercased.
    pub case_insensitive: bool,
    /// Additional characters to treat as separators.
    pub extra_separators: Vec<char>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            extra_separators: vec![],
        }
    }
}

impl TokenizerConfig {
    /// Creates a new tokenizer configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Adds extra separator characters.
    #[must_use]
    pub fn with_separators(mut self, chars: &[char]) -> Self {
        self.extra_separators.extend_from_slice(chars);
        self
    }

    /// Returns true if `c` splits tokens.
    #[must_use]
    pub fn is_separator(&self, c: char) -> bool {
        c.is_whitespace() || c.is_ascii_punctuation() || self.extra_separators.contains(&c)
    }

    /// Splits text into tokens, lowercasing them when case-insensitive.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c| self.is_separator(c))
            .filter(|run| !run.is_empty())
            .map(|run| self.normalize(run))
            .collect()
    }

    /// Applies the configured case folding.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        if self.case_insensitive {
            fold_case(text)
        } else {
            text.to_string()
        }
    }

    /// Longest run of `pattern` without separators; first one wins ties.
    #[must_use]
    pub fn longest_run<'a>(&self, pattern: &'a str) -> &'a str {
        pattern
            .split(|c| self.is_separator(c))
            .fold("", |best, run| {
                if run.chars().count() > best.chars().count() {
                    run
                } else {
                    best
                }
            })
    }

    /// Whether case folding can never create or hide a separator.
    fn folding_is_separator_safe(&self) -> bool {
        self.extra_separators
            .iter()
            .all(|c| c.is_ascii() && !c.is_ascii_alphabetic())
    }
}

/// Lowercases character by character.
///
/// Unlike `str::to_lowercase` this is context free, so folding a substring
/// yields a substring of the folded text.
#[must_use]
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Substring test used by `contains` predicates.
#[must_use]
pub fn contains_text(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        fold_case(text).contains(&fold_case(pattern))
    } else {
        text.contains(pattern)
    }
}

/// Edit distance between two strings, counted in characters.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Normalized similarity `1 - distance / max(len)`; 1.0 for two empty
/// strings.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn token_matches(token: &str, query_token: &str, threshold: f64) -> bool {
    token.starts_with(query_token) || similarity(query_token, token) >= threshold
}

/// Fuzzy match used by `matches` predicates.
///
/// Both sides are tokenized with the default tokenizer. The text matches
/// when every query token is a prefix of, or at least `threshold` similar
/// to, some text token. A query without tokens matches nothing.
#[must_use]
pub fn fuzzy_matches(text: &str, query: &str, threshold: f64) -> bool {
    let tokenizer = TokenizerConfig::default();
    let query_tokens = tokenizer.tokenize(query);
    if query_tokens.is_empty() {
        return false;
    }
    let text_tokens: HashSet<String> = tokenizer.tokenize(text).into_iter().collect();
    query_tokens.iter().all(|q| {
        text_tokens
            .iter()
            .any(|token| token_matches(token, q, threshold))
    })
}

/// Full-text index for token-based text search.
///
/// `FtsIndex` provides:
/// - Inverted index: token → set of entity IDs
/// - Forward index: entity ID → set of tokens (for updates)
/// - Case-insensitive matching (configurable)
/// - Prefix search
/// - Multi-token AND queries
///
/// Non-text field values are not indexed.
///
/// # Example
///
/// ```rust,ignore
/// let mut index = FtsIndex::new(IndexDef::full_text("body_fts", ["body"]));
/// index.upsert(&message, seq);
/// let results = index.search("hello world");
/// ```
#[derive(Debug)]
pub struct FtsIndex {
    def: IndexDef,
    tokenizer: TokenizerConfig,
    /// Inverted index: normalized token → set of entity IDs.
    inverted: HashMap<String, HashSet<EntityId>>,
    /// Forward index: entity ID → set of indexed tokens.
    forward: HashMap<EntityId, HashSet<String>>,
}

impl FtsIndex {
    /// Creates a new full-text index.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        let tokenizer = match &def.kind {
            IndexKind::FullText(config) => config.clone(),
            _ => TokenizerConfig::default(),
        };
        Self {
            def,
            tokenizer,
            inverted: HashMap::new(),
            forward: HashMap::new(),
        }
    }

    /// The tokenizer configuration.
    #[must_use]
    pub fn tokenizer(&self) -> &TokenizerConfig {
        &self.tokenizer
    }

    /// Returns true if the index covers `field`.
    #[must_use]
    pub fn covers(&self, field: &str) -> bool {
        self.def.fields.iter().any(|f| f == field)
    }

    /// Returns the number of unique tokens in the index.
    #[must_use]
    pub fn unique_token_count(&self) -> usize {
        self.inverted.len()
    }

    /// Returns all tokens indexed for an entity.
    #[must_use]
    pub fn tokens_for_entity(&self, id: &EntityId) -> Option<&HashSet<String>> {
        self.forward.get(id)
    }

    /// Searches for entities holding a token (exact match).
    #[must_use]
    pub fn search_token(&self, token: &str) -> HashSet<EntityId> {
        self.inverted
            .get(&self.tokenizer.normalize(token))
            .cloned()
            .unwrap_or_default()
    }

    /// Searches for entities holding any token that starts with `prefix`.
    #[must_use]
    pub fn search_prefix(&self, prefix: &str) -> HashSet<EntityId> {
        let prefix = self.tokenizer.normalize(prefix);
        self.postings_where(|token| token.starts_with(&prefix))
    }

    /// Searches for entities holding all tokens of the query (AND
    /// semantics).
    #[must_use]
    pub fn search(&self, query: &str) -> HashSet<EntityId> {
        let mut tokens = self.tokenizer.tokenize(query).into_iter();
        let Some(first) = tokens.next() else {
            return HashSet::new();
        };
        let mut results = self.inverted.get(&first).cloned().unwrap_or_default();
        for token in tokens {
            match self.inverted.get(&token) {
                Some(ids) => results.retain(|id| ids.contains(id)),
                None => return HashSet::new(),
            }
        }
        results
    }

    /// Candidates for `field contains pattern`, a superset of the matching
    /// entities. `None` when this index cannot narrow the predicate.
    #[must_use]
    pub fn contains_candidates(
        &self,
        pattern: &str,
        case_insensitive: bool,
    ) -> Option<HashSet<EntityId>> {
        if case_insensitive
            && !(self.tokenizer.case_insensitive && self.tokenizer.folding_is_separator_safe())
        {
            return None;
        }
        let run = self.tokenizer.longest_run(pattern);
        if run.is_empty() {
            return None;
        }
        let run = self.tokenizer.normalize(run);
        Some(self.postings_where(|token| token.contains(&run)))
    }

    /// Candidates for a fuzzy `matches` predicate, a superset of the
    /// matching entities. `None` unless the index uses the default
    /// tokenizer, which fuzzy matching is defined over.
    #[must_use]
    pub fn fuzzy_candidates(&self, query: &str, threshold: f64) -> Option<HashSet<EntityId>> {
        if self.tokenizer != TokenizerConfig::default() {
            return None;
        }
        let query_tokens = self.tokenizer.tokenize(query);
        let mut results: Option<HashSet<EntityId>> = None;
        for q in &query_tokens {
            let hits = self.postings_where(|token| token_matches(token, q, threshold));
            results = Some(match results {
                Some(mut acc) => {
                    acc.retain(|id| hits.contains(id));
                    acc
                }
                None => hits,
            });
        }
        Some(results.unwrap_or_default())
    }

    fn postings_where(&self, pred: impl Fn(&str) -> bool) -> HashSet<EntityId> {
        self.inverted
            .iter()
            .filter(|(token, _)| pred(token))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }
}

impl SecondaryIndex for FtsIndex {
    fn def(&self) -> &IndexDef {
        &self.def
    }

    fn upsert(&mut self, entity: &Entity, _seq: SequenceNumber) {
        let tokens: HashSet<String> = self
            .def
            .fields
            .iter()
            .filter_map(|f| match entity.field(f) {
                Value::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .flat_map(|text| self.tokenizer.tokenize(text))
            .collect();

        if self.forward.get(entity.id()) == Some(&tokens) {
            return;
        }
        self.remove(entity.id());
        for token in &tokens {
            self.inverted
                .entry(token.clone())
                .or_default()
                .insert(entity.id().clone());
        }
        self.forward.insert(entity.id().clone(), tokens);
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let Some(tokens) = self.forward.remove(id) else {
            return false;
        };
        for token in &tokens {
            if let Some(ids) = self.inverted.get_mut(token) {
                ids.remove(id);
                if ids.is_empty() {
                    self.inverted.remove(token);
                }
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.forward.len()
    }

    fn clear(&mut self) {
        self.inverted.clear();
        self.forward.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_index() -> FtsIndex {
        FtsIndex::new(IndexDef::full_text("body_fts", ["body"]))
    }

    fn doc(id: &str, body: &str) -> Entity {
        Entity::new("Doc", id).with_field("body", body)
    }

    fn indexed(docs: &[(&str, &str)]) -> FtsIndex {
        let mut index = create_index();
        for (i, (id, body)) in docs.iter().enumerate() {
            index.upsert(&doc(id, body), SequenceNumber::new(i as u64));
        }
        index
    }

    #[test]
    fn tokenize_with_punctuation() {
        let tokens = TokenizerConfig::default().tokenize("Hello, World! How are you?");
        assert_eq!(tokens, vec!["hello", "world", "how", "are", "you"]);
    }

    #[test]
    fn tokenize_case_sensitive() {
        let tokens = TokenizerConfig::new().case_sensitive().tokenize("Hello World HELLO");
        assert_eq!(tokens, vec!["Hello", "World", "HELLO"]);
    }

    #[test]
    fn tokenize_extra_separators() {
        let tokens = TokenizerConfig::new().with_separators(&['|']).tokenize("a|b c");
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }

    #[test]
    fn longest_run_picks_first_on_tie() {
        let tokenizer = TokenizerConfig::default();
        assert_eq!(tokenizer.longest_run("ab, cd"), "ab");
        assert_eq!(tokenizer.longest_run("x wxyz"), "wxyz");
        assert_eq!(tokenizer.longest_run(" ,"), "");
    }

    #[test]
    fn index_and_search() {
        let index = indexed(&[
            ("d1", "Hello world"),
            ("d2", "World of rust"),
            ("d3", "Rust is great"),
        ]);
        assert_eq!(index.search("world").len(), 2);
        assert_eq!(index.search("hello rust").len(), 0);
        assert_eq!(index.search_token("RUST").len(), 2);
        assert_eq!(index.search_prefix("gr").len(), 1);
    }

    #[test]
    fn reindex_replaces_tokens() {
        let mut index = indexed(&[("d1", "old words")]);
        index.upsert(&doc("d1", "new words"), SequenceNumber::new(0));
        assert!(index.search_token("old").is_empty());
        assert_eq!(index.search_token("new").len(), 1);
        assert_eq!(index.unique_token_count(), 2);
    }

    #[test]
    fn remove_cleans_postings() {
        let mut index = indexed(&[("d1", "alpha beta")]);
        assert!(index.remove(&EntityId::from("d1")));
        assert_eq!(index.unique_token_count(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn contains_candidates_are_a_superset() {
        let index = indexed(&[
            ("d1", "the quick brown fox"),
            ("d2", "quicksilver"),
            ("d3", "slow turtle"),
        ]);
        let candidates = index.contains_candidates("ck br", false).unwrap();
        assert!(candidates.contains(&EntityId::from("d1")));
        assert!(!candidates.contains(&EntityId::from("d3")));

        assert!(index.contains_candidates(", ", false).is_none());
    }

    #[test]
    fn case_sensitive_index_cannot_serve_case_insensitive_contains() {
        let index = FtsIndex::new(
            IndexDef::full_text("body_fts", ["body"])
                .with_tokenizer(TokenizerConfig::new().case_sensitive()),
        );
        assert!(index.contains_candidates("abc", true).is_none());
        assert!(index.contains_candidates("abc", false).is_some());
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert!((similarity("rust", "rusk") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn fuzzy_matching() {
        assert!(fuzzy_matches("Programming in Rust", "progr rust", 0.75));
        assert!(fuzzy_matches("Programming in Rust", "rusk", 0.75));
        assert!(!fuzzy_matches("Programming in Rust", "python", 0.75));
        assert!(!fuzzy_matches("anything", "  ", 0.75));
    }

    #[test]
    fn fuzzy_candidates_match_scan() {
        let bodies = [("d1", "Programming in Rust"), ("d2", "Rusty nails"), ("d3", "python")];
        let index = indexed(&bodies);
        let candidates = index.fuzzy_candidates("rusk", 0.75).unwrap();
        for (id, body) in bodies {
            assert_eq!(
                candidates.contains(&EntityId::from(id)),
                fuzzy_matches(body, "rusk", 0.75),
                "{id}"
            );
        }
    }

    #[test]
    fn non_text_fields_are_skipped() {
        let mut index = create_index();
        index.upsert(&Entity::new("Doc", "d1").with_field("body", 42), SequenceNumber::new(1));
        assert_eq!(index.tokens_for_entity(&EntityId::from("d1")).map(HashSet::len), Some(0));
    }
}
