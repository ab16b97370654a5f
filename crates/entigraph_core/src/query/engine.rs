//! Query resolution: narrow, order, window, materialize, expand.

use std::cmp::Ordering;
use std::collections::HashSet;

use entigraph_codec::Value;
use tracing::{trace, warn};

use super::{Expansion, ExpansionMode, Predicate, Query, QueryOptions};
use crate::config::Config;
use crate::entity::{Entity, EntityId, EntityStore};
use crate::error::{CoreError, CoreResult};
use crate::index::{Comparison, IndexEngine};
use crate::relation::{RelationLedger, RelationValue};
use crate::schema::Schema;
use crate::stats::ContextStats;
use crate::types::SortOrder;

/// Read-only view over a context's state that resolves queries.
pub(crate) struct QueryEngine<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) store: &'a EntityStore,
    pub(crate) ledger: &'a RelationLedger,
    pub(crate) indexes: &'a IndexEngine,
    pub(crate) config: &'a Config,
    pub(crate) stats: &'a ContextStats,
}

impl QueryEngine<'_> {
    /// Collection resolution.
    pub(crate) fn resolve(&self, query: &Query) -> CoreResult<Vec<Entity>> {
        self.stats.record_query();
        let ids = self.select(&query.type_name, &query.options, None)?;
        self.materialize(&query.type_name, &ids, &query.options)
    }

    /// Matching ids in result order.
    pub(crate) fn ids(&self, query: &Query) -> CoreResult<Vec<EntityId>> {
        self.stats.record_query();
        self.select(&query.type_name, &query.options, None)
    }

    /// First result, if any.
    pub(crate) fn first(&self, query: &Query) -> CoreResult<Option<Entity>> {
        self.stats.record_query();
        let ids = self.select(&query.type_name, &query.options, None)?;
        let head = ids.first().map(std::slice::from_ref).unwrap_or_default();
        Ok(self.materialize(&query.type_name, head, &query.options)?.into_iter().next())
    }

    /// The entity `id` resolved with the query's options, if it exists and
    /// passes the filter.
    pub(crate) fn by_id(&self, query: &Query, id: &EntityId) -> CoreResult<Option<Entity>> {
        self.stats.record_query();
        let base = [id.clone()];
        let ids = self.select(&query.type_name, &query.options, Some(&base))?;
        Ok(self.materialize(&query.type_name, &ids, &query.options)?.into_iter().next())
    }

    /// Steps 1 to 3: filtered, ordered and windowed ids.
    ///
    /// With a `base`, candidates are restricted to it and its order is the
    /// default result order; otherwise the whole type in insertion order.
    fn select(&self, type_name: &str, options: &QueryOptions, base: Option<&[EntityId]>) -> CoreResult<Vec<EntityId>> {
        let base_ids: Option<Vec<EntityId>> =
            base.map(|ids| ids.iter().filter(|id| self.store.contains(type_name, id)).cloned().collect());
        let base_set: Option<HashSet<EntityId>> = base_ids.as_ref().map(|ids| ids.iter().cloned().collect());

        let matched = match &options.predicate {
            Some(predicate) => Some(self.narrow(type_name, predicate, base_set.as_ref(), options.use_indexes)?),
            None => None,
        };
        let keep = |id: &EntityId| matched.as_ref().map_or(true, |m| m.contains(id));

        let indexed_order = if base.is_none() && options.use_indexes && !options.sort.is_empty() {
            self.indexes.sorted_ids(type_name, &options.sort)
        } else {
            None
        };

        let ids: Vec<EntityId> = if let Some(order) = indexed_order {
            self.stats.record_index_lookup();
            trace!(type_name, "ordering through sort index");
            order.into_iter().filter(|id| keep(id)).collect()
        } else {
            let ids = base_ids.unwrap_or_else(|| self.store.ids(type_name));
            let mut entities: Vec<&Entity> = ids
                .iter()
                .filter(|id| keep(id))
                .filter_map(|id| self.store.find(type_name, id))
                .collect();
            if !options.sort.is_empty() {
                entities.sort_by(|a, b| compare_entities(a, b, &options.sort));
            }
            entities.into_iter().map(|e| e.id().clone()).collect()
        };

        Ok(paginate(ids, options.offset, options.limit))
    }

    /// Ids of `type_name` satisfying `predicate`, restricted to `within`.
    fn narrow(
        &self,
        type_name: &str,
        predicate: &Predicate,
        within: Option<&HashSet<EntityId>>,
        use_indexes: bool,
    ) -> CoreResult<HashSet<EntityId>> {
        match predicate {
            Predicate::And(clauses) => self.narrow_and(type_name, clauses, within, use_indexes),
            Predicate::Or(clauses) => {
                let mut union = HashSet::new();
                for clause in clauses {
                    union.extend(self.narrow(type_name, clause, within, use_indexes)?);
                }
                Ok(union)
            }
            Predicate::Not(inner) => {
                let excluded = self.narrow(type_name, inner, within, use_indexes)?;
                let universe = self.universe(type_name, within)?;
                Ok(universe.into_iter().filter(|id| !excluded.contains(id)).collect())
            }
            leaf => {
                let candidates = if use_indexes { self.index_candidates(type_name, leaf) } else { None };
                match candidates {
                    Some(candidates) => Ok(self.verify(type_name, leaf, candidates, within)),
                    None => self.scan(type_name, leaf, within),
                }
            }
        }
    }

    fn narrow_and(
        &self,
        type_name: &str,
        clauses: &[Predicate],
        within: Option<&HashSet<EntityId>>,
        use_indexes: bool,
    ) -> CoreResult<HashSet<EntityId>> {
        let mut current: Option<HashSet<EntityId>> = within.cloned();
        let mut remaining: Vec<&Predicate> = clauses.iter().collect();

        if use_indexes {
            let mut pairs: Vec<(&str, &Value)> = Vec::new();
            for clause in clauses {
                if let Predicate::Compare { field, op: Comparison::Eq, value } = clause {
                    if !pairs.iter().any(|(f, _)| *f == field.as_str()) {
                        pairs.push((field.as_str(), value));
                    }
                }
            }
            if let Some((ids, consumed)) = self.indexes.lookup_eq(type_name, &pairs) {
                self.stats.record_index_lookup();
                trace!(type_name, fields = ?consumed, "equality lookup");
                current = Some(intersect(current, ids));
                let consumed: Vec<(&str, &Value)> =
                    pairs.iter().filter(|(f, _)| consumed.iter().any(|c| c.as_str() == *f)).copied().collect();
                remaining.retain(|clause| {
                    !matches!(clause, Predicate::Compare { field, op: Comparison::Eq, value }
                        if consumed.iter().any(|(f, v)| *f == field.as_str() && *v == value))
                });
            }

            let mut unserved = Vec::with_capacity(remaining.len());
            for clause in remaining {
                match self.index_candidates(type_name, clause) {
                    Some(candidates) => {
                        let verified = self.verify(type_name, clause, candidates, current.as_ref());
                        current = Some(verified);
                    }
                    None => unserved.push(clause),
                }
            }
            remaining = unserved;
        }

        for clause in remaining {
            current = Some(self.narrow(type_name, clause, current.as_ref(), use_indexes)?);
        }

        match current {
            Some(ids) => Ok(ids),
            None => self.universe(type_name, None),
        }
    }

    /// Superset of the ids satisfying a leaf predicate, from an index.
    fn index_candidates(&self, type_name: &str, predicate: &Predicate) -> Option<HashSet<EntityId>> {
        let candidates = match predicate {
            Predicate::Compare { field, op: Comparison::Eq, value } => self
                .indexes
                .lookup_eq(type_name, &[(field.as_str(), value)])
                .map(|(ids, _)| ids)
                .or_else(|| self.indexes.range(type_name, field, Comparison::Eq, value)),
            Predicate::Compare { field, op, value } => self.indexes.range(type_name, field, *op, value),
            Predicate::Contains {
                field,
                pattern,
                case_insensitive,
            } => self
                .indexes
                .contains_candidates(type_name, field, pattern, *case_insensitive),
            Predicate::Matches { field, query } => {
                self.indexes
                    .fuzzy_candidates(type_name, field, query, self.config.fuzzy_threshold)
            }
            _ => None,
        }?;
        self.stats.record_index_lookup();
        trace!(type_name, candidates = candidates.len(), "index narrowing");
        Some(candidates)
    }

    /// Keeps the candidates inside `within` that satisfy `predicate`.
    fn verify(
        &self,
        type_name: &str,
        predicate: &Predicate,
        candidates: HashSet<EntityId>,
        within: Option<&HashSet<EntityId>>,
    ) -> HashSet<EntityId> {
        let threshold = self.config.fuzzy_threshold;
        candidates
            .into_iter()
            .filter(|id| within.map_or(true, |w| w.contains(id)))
            .filter(|id| {
                self.store
                    .find(type_name, id)
                    .is_some_and(|entity| predicate.evaluate(entity, threshold))
            })
            .collect()
    }

    fn scan(
        &self,
        type_name: &str,
        predicate: &Predicate,
        within: Option<&HashSet<EntityId>>,
    ) -> CoreResult<HashSet<EntityId>> {
        let threshold = self.config.fuzzy_threshold;
        let universe = self.universe(type_name, within)?;
        Ok(universe
            .into_iter()
            .filter(|id| {
                self.store
                    .find(type_name, id)
                    .is_some_and(|entity| predicate.evaluate(entity, threshold))
            })
            .collect())
    }

    /// The candidate set itself, or every id of the type (a full scan).
    fn universe(&self, type_name: &str, within: Option<&HashSet<EntityId>>) -> CoreResult<HashSet<EntityId>> {
        if let Some(within) = within {
            return Ok(within.clone());
        }
        if self.config.forbid_full_scans {
            return Err(CoreError::invalid_operation(format!(
                "query on {type_name} requires a full scan and full scans are forbidden"
            )));
        }
        self.stats.record_full_scan();
        let count = self.store.count(type_name);
        if count > self.config.scan_warning_threshold {
            warn!(type_name, count, threshold = self.config.scan_warning_threshold, "full scan");
        }
        Ok(self.store.ids(type_name).into_iter().collect())
    }

    /// Steps 4 and 5: clone, project and expand.
    fn materialize(&self, type_name: &str, ids: &[EntityId], options: &QueryOptions) -> CoreResult<Vec<Entity>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(stored) = self.store.find(type_name, id) else {
                continue;
            };
            let mut entity = match &options.projection {
                Some(fields) => stored.clone().project(fields),
                None => stored.clone(),
            };
            for expansion in &options.expansions {
                self.expand(type_name, &mut entity, expansion)?;
            }
            out.push(entity);
        }
        Ok(out)
    }

    fn expand(&self, type_name: &str, entity: &mut Entity, expansion: &Expansion) -> CoreResult<()> {
        let def = self.schema.relation(type_name, &expansion.relation)?;
        let target = def.target.as_str();
        let linked = self.ledger.children(type_name, &def.name, entity.id()).to_vec();
        let ids = self.select(target, &expansion.options, Some(&linked))?;

        let value = match expansion.mode {
            ExpansionMode::Ids if def.is_to_many() => RelationValue::ids(ids),
            ExpansionMode::Ids => ids.into_iter().next().map_or(RelationValue::None, RelationValue::id),
            ExpansionMode::Full | ExpansionMode::Fragment => {
                // Projected results are partial even in full mode.
                let fragment =
                    expansion.mode == ExpansionMode::Fragment || expansion.options.projection.is_some();
                let entities = self.materialize(target, &ids, &expansion.options)?;
                if def.is_to_many() {
                    RelationValue::entity_list(entities, false, fragment)
                } else {
                    entities.into_iter().next().map_or(RelationValue::None, |entity| {
                        RelationValue::SingleEntity {
                            entity: Box::new(entity),
                            fragment,
                        }
                    })
                }
            }
        };
        entity.set_relation(def.name.clone(), value);
        Ok(())
    }
}

fn intersect(current: Option<HashSet<EntityId>>, ids: HashSet<EntityId>) -> HashSet<EntityId> {
    match current {
        Some(current) => ids.into_iter().filter(|id| current.contains(id)).collect(),
        None => ids,
    }
}

fn compare_entities(a: &Entity, b: &Entity, sort: &[(String, SortOrder)]) -> Ordering {
    sort.iter()
        .map(|(field, order)| order.apply(a.field(field).cmp(b.field(field))))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Offset/limit window; negative or out-of-range bounds give nothing.
fn paginate(ids: Vec<EntityId>, offset: i64, limit: Option<i64>) -> Vec<EntityId> {
    let Ok(offset) = usize::try_from(offset) else {
        return Vec::new();
    };
    let take = match limit {
        Some(limit) if limit <= 0 => return Vec::new(),
        Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
        None => usize::MAX,
    };
    if offset >= ids.len() {
        return Vec::new();
    }
    ids.into_iter().skip(offset).take(take).collect()
}
