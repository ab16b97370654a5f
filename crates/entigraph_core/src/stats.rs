//! Context statistics.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut ctx = Context::new(schema)?;
//! ctx.save(user)?;
//!
//! let stats = ctx.stats().snapshot();
//! println!("Saves: {}", stats.saves);
//! println!("Full scans: {}", stats.full_scans);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters of a context.
///
/// Counters are atomic so read paths (`&self`) can record them; values only
/// grow.
#[derive(Debug, Default)]
pub struct ContextStats {
    /// Entities written through the save path (nested saves included).
    saves: AtomicU64,
    /// Entities removed from the store (deletes, evictions, removals).
    removals: AtomicU64,
    /// Predicates answered through an index.
    index_lookups: AtomicU64,
    /// Predicates answered by scanning a whole type.
    full_scans: AtomicU64,
    /// Top-level calls undone after an error.
    rollbacks: AtomicU64,
    /// Queries resolved.
    queries: AtomicU64,
}

impl ContextStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_lookup(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_full_scan(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of saved entities.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Returns the number of removed entities.
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Returns the number of index-served predicates.
    pub fn index_lookups(&self) -> u64 {
        self.index_lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of full scans.
    ///
    /// High scan counts may indicate missing indexes.
    pub fn full_scans(&self) -> u64 {
        self.full_scans.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back calls.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Returns the number of resolved queries.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            saves: self.saves(),
            removals: self.removals(),
            index_lookups: self.index_lookups(),
            full_scans: self.full_scans(),
            rollbacks: self.rollbacks(),
            queries: self.queries(),
        }
    }
}

/// A point-in-time copy of [`ContextStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Saved entities.
    pub saves: u64,
    /// Removed entities.
    pub removals: u64,
    /// Index-served predicates.
    pub index_lookups: u64,
    /// Full scans.
    pub full_scans: u64,
    /// Rolled back calls.
    pub rollbacks: u64,
    /// Resolved queries.
    pub queries: u64,
}
