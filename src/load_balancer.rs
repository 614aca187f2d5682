//! Load balancer: per-node health, per-path load, and candidate
//! arbitration (spec §4.4).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ema::Ema;
use crate::types::{NodeId, RouteEntry, RouteMetrics, SelectionReason};

/// Per-path aggregate load and latency tracking (spec §3 "Path Load Info").
///
/// Spec §4.4's `update_metrics` is keyed by destination, not by path (§9
/// explicitly leaves per-path EMA tracking optional). This crate keys its
/// tracked aggregate by a path's *destination* node, which coincides with
/// "per path" whenever a destination has one dominant route — the common
/// case this cache is built for — and documents the simplification in
/// DESIGN.md rather than silently picking one reading.
#[derive(Debug, Clone)]
pub struct PathLoadInfo {
    pub current_load: f64,
    pub max_capacity: f64,
    pub last_updated: Instant,
    pub load_ema: Ema,
    pub latency_ema: Ema,
    pub success_rate: f64,
    pub failure_count: u64,
    pub total_count: u64,
}

impl PathLoadInfo {
    fn new(now: Instant, alpha: f64) -> Self {
        Self {
            current_load: 0.0,
            max_capacity: 1.0,
            last_updated: now,
            load_ema: Ema::new(alpha),
            latency_ema: Ema::new(alpha),
            success_rate: 1.0,
            failure_count: 0,
            total_count: 0,
        }
    }
}

/// Per-node health and load tracking (spec §3 "Node Load Info").
#[derive(Debug, Clone)]
pub struct NodeLoadInfo {
    pub current_load: f64,
    pub max_capacity: f64,
    pub last_updated: Instant,
    pub is_healthy: bool,
    pub last_health_check: Instant,
    pub avg_latency: Duration,
    pub packet_loss: f64,
    pub jitter: Duration,
}

impl NodeLoadInfo {
    fn new(now: Instant) -> Self {
        Self {
            current_load: 0.0,
            max_capacity: 1.0,
            last_updated: now,
            is_healthy: true,
            last_health_check: now,
            avg_latency: Duration::ZERO,
            packet_loss: 0.0,
            jitter: Duration::ZERO,
        }
    }
}

/// Health telemetry reported by an external monitor (spec §6.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthTelemetry {
    pub latency: Duration,
    pub packet_loss: f64,
    pub jitter: Duration,
}

/// Tunables for the load balancer; defaults match spec §6.
#[derive(Debug, Clone, Copy)]
pub struct LoadBalancerConfig {
    pub load_balance_threshold: f64,
    pub ema_alpha: f64,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            load_balance_threshold: 0.8,
            ema_alpha: 0.2,
        }
    }
}

/// Outcome of [`LoadBalancer::select_optimal_path`].
#[derive(Debug, Clone)]
pub struct PathSelectionDecision {
    pub selected: usize,
    pub reason: SelectionReason,
    pub load_score: f64,
}

/// Cumulative load-balancer statistics (§4.4 `stats()`).
#[derive(Debug, Clone, Default)]
pub struct LoadBalancerStats {
    pub decisions: u64,
    pub load_balanced_decisions: u64,
    pub failover_events: u64,
    pub health_check_failures: u64,
    pub tracked_paths: usize,
    pub tracked_nodes: usize,
}

impl LoadBalancerStats {
    pub fn load_balance_rate(&self) -> f64 {
        if self.decisions == 0 {
            0.0
        } else {
            100.0 * self.load_balanced_decisions as f64 / self.decisions as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    decisions: u64,
    load_balanced_decisions: u64,
    failover_events: u64,
    health_check_failures: u64,
}

/// Tracks per-node health and per-path load; arbitrates among candidates.
pub struct LoadBalancer {
    config: LoadBalancerConfig,
    dest_loads: RwLock<HashMap<NodeId, PathLoadInfo>>,
    nodes: RwLock<HashMap<NodeId, NodeLoadInfo>>,
    counters: RwLock<Counters>,
}

impl LoadBalancer {
    pub fn new(config: LoadBalancerConfig) -> Self {
        Self {
            config,
            dest_loads: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// `load_score ∈ [0,1]`: clamped weighted sum of normalized latency
    /// (0.4), inverted normalized throughput (0.4), inverted reliability
    /// (0.2) — spec §4.4.
    pub fn load_score(metrics: &RouteMetrics) -> f64 {
        let norm_latency = metrics.latency_us() / 10_000.0;
        let norm_throughput = (metrics.throughput / 1_000.0).clamp(0.0, 1.0);
        let score =
            0.4 * norm_latency + 0.4 * (1.0 - norm_throughput) + 0.2 * (1.0 - metrics.reliability);
        score.clamp(0.0, 1.0)
    }

    /// Mean of `is_healthy` across `path`'s nodes; unknown nodes count as
    /// healthy.
    pub fn health_score(&self, path: &[NodeId]) -> f64 {
        if path.is_empty() {
            return 1.0;
        }
        let nodes = self.nodes.read();
        let sum: f64 = path
            .iter()
            .map(|n| {
                nodes
                    .get(n)
                    .map(|info| info.is_healthy as u8 as f64)
                    .unwrap_or(1.0)
            })
            .sum();
        sum / path.len() as f64
    }

    fn combined_score(quality_score: f64, load_score: f64, health_score: f64) -> f64 {
        0.4 * quality_score + 0.4 * (1.0 - load_score) + 0.2 * health_score
    }

    /// Tracked aggregate for the path's destination if known, else the mean
    /// `current_load` across known nodes along the path, else `0.5`
    /// (spec §4.4).
    pub fn get_path_load(&self, path: &[NodeId]) -> f64 {
        if let Some(destination) = path.last() {
            if let Some(info) = self.dest_loads.read().get(destination) {
                return info.load_ema.value_or(info.current_load);
            }
        }
        let nodes = self.nodes.read();
        let known: Vec<f64> = path
            .iter()
            .filter_map(|n| nodes.get(n).map(|i| i.current_load))
            .collect();
        if known.is_empty() {
            0.5
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        }
    }

    /// Arbitrate among candidate routes by combined score (spec §4.4).
    pub fn select_optimal_path(&self, candidates: &[RouteEntry]) -> PathSelectionDecision {
        let mut counters = self.counters.write();
        counters.decisions += 1;

        if candidates.is_empty() {
            return PathSelectionDecision {
                selected: 0,
                reason: SelectionReason::NoCandidates,
                load_score: 0.0,
            };
        }
        if candidates.len() == 1 {
            let load = self.get_path_load(&candidates[0].path);
            return PathSelectionDecision {
                selected: 0,
                reason: SelectionReason::SingleOption,
                load_score: load,
            };
        }

        let mut ranked: Vec<(usize, f64, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let load = self.get_path_load(&c.path);
                let health = self.health_score(&c.path);
                (i, Self::combined_score(c.quality_score, load, health), load)
            })
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (top_index, _, top_load) = ranked[0];
        let reason = if top_load > self.config.load_balance_threshold && top_index != 0 {
            SelectionReason::LoadBalanced
        } else {
            SelectionReason::BestScore
        };
        if reason == SelectionReason::LoadBalanced {
            counters.load_balanced_decisions += 1;
        }

        PathSelectionDecision {
            selected: top_index,
            reason,
            load_score: top_load,
        }
    }

    /// Integrate an observed route metrics sample for `destination`
    /// (spec §4.4). Counts the event unconditionally; tracks a load/latency
    /// EMA as the optional enrichment §9 allows.
    pub fn update_metrics(&self, destination: NodeId, metrics: &RouteMetrics, success: bool) {
        let now = Instant::now();
        let mut loads = self.dest_loads.write();
        let entry = loads
            .entry(destination)
            .or_insert_with(|| PathLoadInfo::new(now, self.config.ema_alpha));
        entry.current_load = Self::load_score(metrics);
        entry.load_ema.update(entry.current_load);
        entry.latency_ema.update(metrics.latency_us());
        entry.total_count += 1;
        if !success {
            entry.failure_count += 1;
        }
        entry.success_rate = 1.0 - entry.failure_count as f64 / entry.total_count as f64;
        entry.last_updated = now;
        drop(loads);
        if !success {
            self.counters.write().failover_events += 1;
        }
    }

    /// Create-or-update a node's health record.
    pub fn update_node_health(&self, node: NodeId, is_healthy: bool, telemetry: HealthTelemetry) {
        let now = Instant::now();
        let mut nodes = self.nodes.write();
        let entry = nodes.entry(node).or_insert_with(|| NodeLoadInfo::new(now));
        entry.is_healthy = is_healthy;
        entry.last_health_check = now;
        entry.last_updated = now;
        entry.avg_latency = telemetry.latency;
        entry.packet_loss = telemetry.packet_loss;
        entry.jitter = telemetry.jitter;
        drop(nodes);
        if !is_healthy {
            self.counters.write().health_check_failures += 1;
        }
    }

    /// `(is_healthy, node load info)`; unknown nodes report healthy with no
    /// tracked info.
    pub fn get_node_health(&self, node: NodeId) -> (bool, Option<NodeLoadInfo>) {
        match self.nodes.read().get(&node) {
            Some(info) => (info.is_healthy, Some(info.clone())),
            None => (true, None),
        }
    }

    pub fn stats(&self) -> LoadBalancerStats {
        let counters = self.counters.read();
        LoadBalancerStats {
            decisions: counters.decisions,
            load_balanced_decisions: counters.load_balanced_decisions,
            failover_events: counters.failover_events,
            health_check_failures: counters.health_check_failures,
            tracked_paths: self.dest_loads.read().len(),
            tracked_nodes: self.nodes.read().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    fn metrics(latency_ms: u64, throughput: f64, reliability: f64) -> RouteMetrics {
        RouteMetrics {
            latency: Duration::from_millis(latency_ms),
            throughput,
            reliability,
            cost: 1.0,
            hop_count: 1,
            load: 0.0,
            jitter: Duration::from_millis(1),
            packet_loss: 0.0,
        }
    }

    fn entry(path: Vec<i64>, quality: f64) -> RouteEntry {
        let nodes: Vec<NodeId> = path.into_iter().map(|n| NodeId::new(n).unwrap()).collect();
        let mut m = metrics(10, 500.0, 0.95);
        m.hop_count = (nodes.len() - 1) as u32;
        RouteEntry::new(nodes, m, quality, Value::Null, 0.9, Instant::now()).unwrap()
    }

    #[test]
    fn no_candidates_is_flagged() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let decision = lb.select_optimal_path(&[]);
        assert_eq!(decision.reason, SelectionReason::NoCandidates);
    }

    #[test]
    fn single_candidate_is_single_option() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let candidates = vec![entry(vec![1, 2], 0.9)];
        let decision = lb.select_optimal_path(&candidates);
        assert_eq!(decision.reason, SelectionReason::SingleOption);
        assert_eq!(decision.selected, 0);
    }

    #[test]
    fn less_loaded_alternative_wins_on_combined_score() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let p1 = entry(vec![1, 2], 0.9);
        let p2 = entry(vec![1, 3], 0.85);
        lb.update_metrics(p1.destination, &metrics(95, 50.0, 0.5), true);
        lb.update_metrics(p2.destination, &metrics(10, 500.0, 0.98), true);
        let decision = lb.select_optimal_path(&[p1, p2]);
        // p2's much lower load_score wins the combined score even though its
        // own load is below threshold, so the reason is "best_score".
        assert_eq!(decision.selected, 1);
        assert_eq!(decision.reason, SelectionReason::BestScore);
    }

    #[test]
    fn health_score_treats_unknown_nodes_as_healthy() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let path = vec![NodeId::new(1).unwrap(), NodeId::new(2).unwrap()];
        assert_eq!(lb.health_score(&path), 1.0);
        lb.update_node_health(path[0], false, HealthTelemetry::default());
        assert_eq!(lb.health_score(&path), 0.5);
    }

    #[test]
    fn node_health_failure_increments_counter() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        lb.update_node_health(NodeId::new(1).unwrap(), false, HealthTelemetry::default());
        assert_eq!(lb.stats().health_check_failures, 1);
    }

    #[test]
    fn update_metrics_counts_event_even_without_prior_observation() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        lb.update_metrics(NodeId::new(9).unwrap(), &metrics(5, 100.0, 0.9), false);
        assert_eq!(lb.stats().tracked_paths, 1);
        assert_eq!(lb.stats().failover_events, 1);
    }
}
