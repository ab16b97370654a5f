//! Context configuration.

/// Configuration for a [`Context`](crate::Context).
#[derive(Debug, Clone)]
pub struct Config {
    /// Emit a warning when a query scans more entities than this.
    pub scan_warning_threshold: usize,

    /// Strict mode: a predicate no index can serve fails with
    /// `InvalidOperation` instead of scanning the whole type.
    pub forbid_full_scans: bool,

    /// Minimum normalized similarity for fuzzy `matches` predicates.
    pub fuzzy_threshold: f64,

    /// Whether `delete` keeps tombstones (soft delete) by default.
    pub default_soft_delete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_warning_threshold: 1000,
            forbid_full_scans: false,
            fuzzy_threshold: 0.75,
            default_soft_delete: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scan size above which a warning is logged.
    #[must_use]
    pub const fn scan_warning_threshold(mut self, entities: usize) -> Self {
        self.scan_warning_threshold = entities;
        self
    }

    /// Sets strict mode.
    #[must_use]
    pub const fn forbid_full_scans(mut self, value: bool) -> Self {
        self.forbid_full_scans = value;
        self
    }

    /// Sets the fuzzy match threshold, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets whether `delete` keeps tombstones.
    #[must_use]
    pub const fn default_soft_delete(mut self, value: bool) -> Self {
        self.default_soft_delete = value;
        self
    }
}
