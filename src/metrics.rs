//! Metrics aggregator: lookup counters, latency statistics, and
//! invalidation reasons (spec §4.2).

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::ema::Ema;

const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// `(p50, p90, p95, p99)` latency percentiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyPercentiles {
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Snapshot suitable for periodic observability export (spec §4.2
/// `generate_report`).
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub window: Duration,
    pub total_lookups: u64,
    pub successful_lookups: u64,
    pub failed_lookups: u64,
    pub cache_hit_rate: f64,
    pub success_rate: f64,
    pub average_latency: Duration,
    pub invalidation_rate: f64,
    pub percentiles: LatencyPercentiles,
}

/// Result of [`MetricsAggregator::is_performing_well`].
#[derive(Debug, Clone)]
pub struct HealthAssessment {
    pub ok: bool,
    pub issues: Vec<String>,
}

#[derive(Debug)]
struct Inner {
    total_lookups: u64,
    successful_lookups: u64,
    failed_lookups: u64,
    total_lookup_time: Duration,
    min_latency: Duration,
    max_latency: Duration,
    latency_ema: Ema,
    history: VecDeque<Duration>,
    history_capacity: usize,

    cache_hits: u64,
    cache_misses: u64,

    route_updates: u64,
    route_update_successes: u64,

    invalidations_by_reason: HashMap<String, u64>,
    total_invalidations: u64,
}

impl Inner {
    fn new(history_capacity: usize) -> Self {
        Self {
            total_lookups: 0,
            successful_lookups: 0,
            failed_lookups: 0,
            total_lookup_time: Duration::ZERO,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
            latency_ema: Ema::new(0.2),
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            cache_hits: 0,
            cache_misses: 0,
            route_updates: 0,
            route_update_successes: 0,
            invalidations_by_reason: HashMap::new(),
            total_invalidations: 0,
        }
    }

    fn push_history(&mut self, duration: Duration) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(duration);
    }
}

/// Aggregates lookup counters, latency statistics, and invalidation
/// reasons; computes derived rates and percentiles. All mutating
/// operations hold an exclusive lock; reads may proceed concurrently
/// (spec §4.2).
pub struct MetricsAggregator {
    inner: RwLock<Inner>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::new(history_capacity)),
        }
    }

    pub fn record_successful_lookup(&self, duration: Duration) {
        let mut inner = self.inner.write();
        inner.total_lookups += 1;
        inner.successful_lookups += 1;
        inner.total_lookup_time += duration;
        if duration < inner.min_latency {
            inner.min_latency = duration;
        }
        if duration > inner.max_latency {
            inner.max_latency = duration;
        }
        inner.latency_ema.update(duration.as_secs_f64());
        inner.push_history(duration);
    }

    pub fn record_failed_lookup(&self, duration: Duration) {
        let mut inner = self.inner.write();
        inner.total_lookups += 1;
        inner.failed_lookups += 1;
        inner.push_history(duration);
    }

    pub fn record_cache_hit(&self) {
        self.inner.write().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.inner.write().cache_misses += 1;
    }

    pub fn record_route_update(&self, _metrics: &crate::types::RouteMetrics, success: bool) {
        let mut inner = self.inner.write();
        inner.route_updates += 1;
        if success {
            inner.route_update_successes += 1;
        }
    }

    pub fn record_invalidation(&self, reason: impl Into<String>) {
        let mut inner = self.inner.write();
        *inner.invalidations_by_reason.entry(reason.into()).or_insert(0) += 1;
        inner.total_invalidations += 1;
    }

    pub fn total_lookups(&self) -> u64 {
        self.inner.read().total_lookups
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let inner = self.inner.read();
        let total = inner.cache_hits + inner.cache_misses;
        if total == 0 {
            0.0
        } else {
            100.0 * inner.cache_hits as f64 / total as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.read();
        if inner.total_lookups == 0 {
            0.0
        } else {
            100.0 * inner.successful_lookups as f64 / inner.total_lookups as f64
        }
    }

    pub fn average_latency(&self) -> Duration {
        let inner = self.inner.read();
        if inner.successful_lookups == 0 {
            Duration::ZERO
        } else {
            inner.total_lookup_time / inner.successful_lookups as u32
        }
    }

    /// Invalidations per successful lookup, expressed as a percentage.
    pub fn invalidation_rate(&self) -> f64 {
        let inner = self.inner.read();
        if inner.total_lookups == 0 {
            0.0
        } else {
            100.0 * inner.total_invalidations as f64 / inner.total_lookups as f64
        }
    }

    pub fn latency_percentiles(&self) -> LatencyPercentiles {
        percentiles_from_history(&self.inner.read().history)
    }

    pub fn generate_report(&self, window: Duration) -> MetricsReport {
        let inner = self.inner.read();
        let cache_total = inner.cache_hits + inner.cache_misses;
        MetricsReport {
            window,
            total_lookups: inner.total_lookups,
            successful_lookups: inner.successful_lookups,
            failed_lookups: inner.failed_lookups,
            cache_hit_rate: if cache_total == 0 {
                0.0
            } else {
                100.0 * inner.cache_hits as f64 / cache_total as f64
            },
            success_rate: if inner.total_lookups == 0 {
                0.0
            } else {
                100.0 * inner.successful_lookups as f64 / inner.total_lookups as f64
            },
            average_latency: if inner.successful_lookups == 0 {
                Duration::ZERO
            } else {
                inner.total_lookup_time / inner.successful_lookups as u32
            },
            invalidation_rate: if inner.total_lookups == 0 {
                0.0
            } else {
                100.0 * inner.total_invalidations as f64 / inner.total_lookups as f64
            },
            percentiles: percentiles_from_history(&inner.history),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.write();
        let capacity = inner.history_capacity;
        *inner = Inner::new(capacity);
    }

    /// `(ok, issues[])`; flags success rate < 95%, cache hit rate < 70%,
    /// average latency > 5ms, invalidation rate > 10% (spec §4.2).
    pub fn is_performing_well(&self) -> HealthAssessment {
        let mut issues = Vec::new();
        let success_rate = self.success_rate();
        let cache_hit_rate = self.cache_hit_rate();
        let average_latency = self.average_latency();
        let invalidation_rate = self.invalidation_rate();

        if success_rate < 95.0 {
            issues.push(format!("success rate {success_rate:.2}% below 95%"));
        }
        if cache_hit_rate < 70.0 {
            issues.push(format!("cache hit rate {cache_hit_rate:.2}% below 70%"));
        }
        if average_latency > Duration::from_millis(5) {
            issues.push(format!("average latency {average_latency:?} above 5ms"));
        }
        if invalidation_rate > 10.0 {
            issues.push(format!("invalidation rate {invalidation_rate:.2}% above 10%"));
        }

        HealthAssessment {
            ok: issues.is_empty(),
            issues,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn percentiles_from_history(history: &VecDeque<Duration>) -> LatencyPercentiles {
    if history.is_empty() {
        return LatencyPercentiles::default();
    }
    let mut sorted: Vec<Duration> = history.iter().copied().collect();
    sorted.sort_unstable();
    let pick = |pct: f64| -> Duration {
        let idx = ((sorted.len() as f64 - 1.0) * pct).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    };
    LatencyPercentiles {
        p50: pick(0.50),
        p90: pick(0.90),
        p95: pick(0.95),
        p99: pick(0.99),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RouteMetrics;

    fn metrics() -> RouteMetrics {
        RouteMetrics {
            latency: Duration::from_millis(5),
            throughput: 100.0,
            reliability: 0.9,
            cost: 1.0,
            hop_count: 2,
            load: 0.1,
            jitter: Duration::from_millis(1),
            packet_loss: 0.0,
        }
    }

    #[test]
    fn cache_hit_rate_derivation() {
        let agg = MetricsAggregator::new();
        agg.record_cache_hit();
        agg.record_cache_hit();
        agg.record_cache_hit();
        agg.record_cache_miss();
        assert!((agg.cache_hit_rate() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn success_rate_derivation() {
        let agg = MetricsAggregator::new();
        agg.record_successful_lookup(Duration::from_millis(1));
        agg.record_successful_lookup(Duration::from_millis(1));
        agg.record_failed_lookup(Duration::from_millis(1));
        assert!((agg.success_rate() - (200.0 / 3.0)).abs() < 1e-6);
    }

    #[test]
    fn empty_history_percentiles_are_zero() {
        let agg = MetricsAggregator::new();
        let p = agg.latency_percentiles();
        assert_eq!(p.p50, Duration::ZERO);
        assert_eq!(p.p99, Duration::ZERO);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let agg = MetricsAggregator::with_history_capacity(4);
        for i in 1..=10u64 {
            agg.record_successful_lookup(Duration::from_millis(i));
        }
        let inner = agg.inner.read();
        assert_eq!(inner.history.len(), 4);
        assert_eq!(inner.history.front().copied(), Some(Duration::from_millis(7)));
    }

    #[test]
    fn reset_clears_everything() {
        let agg = MetricsAggregator::new();
        agg.record_successful_lookup(Duration::from_millis(5));
        agg.record_cache_hit();
        agg.record_invalidation("ttl_expired");
        agg.reset();
        assert_eq!(agg.success_rate(), 0.0);
        assert_eq!(agg.cache_hit_rate(), 0.0);
        assert_eq!(agg.invalidation_rate(), 0.0);
    }

    #[test]
    fn is_performing_well_flags_low_success_rate() {
        let agg = MetricsAggregator::new();
        agg.record_failed_lookup(Duration::from_millis(1));
        let assessment = agg.is_performing_well();
        assert!(!assessment.ok);
        assert!(assessment.issues.iter().any(|i| i.contains("success rate")));
    }

    #[test]
    fn route_update_is_counted() {
        let agg = MetricsAggregator::new();
        agg.record_route_update(&metrics(), true);
        agg.record_route_update(&metrics(), false);
        let inner = agg.inner.read();
        assert_eq!(inner.route_updates, 2);
        assert_eq!(inner.route_update_successes, 1);
    }
}
