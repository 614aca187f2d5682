//! Routing table configuration (spec §4.5 "Configuration" table).
//!
//! Parses into a strongly typed structure with `serde`, the same
//! parse-then-validate shape the teacher crate's own `config.rs` uses for
//! its TOML-backed settings, minus the hot-reload watcher — this crate
//! does not own process wiring (spec §1 Non-goals).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, RoutingError};

/// Candidate-discovery strategy selected by `lookup_route` (spec §4.5 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    /// Single shortest path from the graph collaborator; confidence 0.8.
    FastLookup,
    /// Associative search engine plus up to two perturbed alternatives.
    Balanced,
    /// Multi-objective optimizer; confidence 0.95 per Pareto solution.
    Deep,
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        OptimizationLevel::Balanced
    }
}

/// Tunables for the routing table coordinator (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTableConfig {
    pub cache_size: usize,
    pub cache_ttl: Duration,
    /// Reserved for batched invalidation; not currently consumed by the
    /// coordinator's synchronous invalidation paths.
    pub invalidation_delay: Duration,
    pub max_alternatives: usize,
    pub search_timeout: Duration,
    pub optimization_level: OptimizationLevel,
    pub load_balance_threshold: f64,
    /// Consumed by an external health-check loop; the core only stores it.
    pub health_check_interval: Duration,
    pub max_concurrent_lookups: usize,
    pub statistics_window: Duration,
}

impl Default for RoutingTableConfig {
    fn default() -> Self {
        Self {
            cache_size: 10_000,
            cache_ttl: Duration::from_secs(5 * 60),
            invalidation_delay: Duration::from_millis(100),
            max_alternatives: 3,
            search_timeout: Duration::from_secs(1),
            optimization_level: OptimizationLevel::Balanced,
            load_balance_threshold: 0.8,
            health_check_interval: Duration::from_secs(30),
            max_concurrent_lookups: 100,
            statistics_window: Duration::from_secs(60 * 60),
        }
    }
}

impl RoutingTableConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(RoutingError::config("cache_size must be nonzero"));
        }
        if self.max_alternatives == 0 {
            return Err(RoutingError::config("max_alternatives must be nonzero"));
        }
        if !(0.0..=1.0).contains(&self.load_balance_threshold) {
            return Err(RoutingError::config(
                "load_balance_threshold must be in [0, 1]",
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(RoutingError::config(
                "max_concurrent_lookups must be nonzero",
            ));
        }
        Ok(())
    }
}
