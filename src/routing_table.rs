//! Routing table coordinator: the lookup pipeline, feedback ingestion, and
//! invalidation entry points (spec §4.5).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cache::RouteCache;
use crate::collaborators::{GraphSource, OptimalPath, OptimizationRequest, PathOptimizer, RoutingSolution, SearchEngine, SearchRequest};
use crate::config::{OptimizationLevel, RoutingTableConfig};
use crate::error::{Result, RoutingError};
use crate::load_balancer::{LoadBalancer, LoadBalancerConfig};
use crate::metrics::MetricsAggregator;
use crate::types::{Constraints, NodeId, QosClass, RouteEntry, RouteMetrics, RoutingRequest, RoutingResponse, SelectionReason};

/// `quality_score(metrics, qos)` — spec §4.5.
pub fn quality_score(metrics: &RouteMetrics, qos: QosClass) -> f64 {
    let latency_us = metrics.latency_us();
    match qos {
        QosClass::LowLatency => 1.0 / (1.0 + latency_us / 1_000.0),
        QosClass::HighThroughput => metrics.throughput / 1_000.0,
        QosClass::HighReliability => metrics.reliability,
        QosClass::CriticalMission => {
            0.5 * metrics.reliability + 0.5 * (1.0 / (1.0 + latency_us / 1_000.0))
        }
        QosClass::BestEffort => 0.8,
    }
}

/// `meets_constraints(entry, constraints)` — spec §4.5. Zero/absent bounds
/// mean "no bound".
pub fn meets_constraints(entry: &RouteEntry, constraints: &Constraints) -> bool {
    if let Some(max_latency) = constraints.max_latency {
        if entry.metrics.latency > max_latency {
            return false;
        }
    }
    if let Some(min_throughput) = constraints.min_throughput {
        if entry.metrics.throughput < min_throughput {
            return false;
        }
    }
    if let Some(min_reliability) = constraints.min_reliability {
        if entry.metrics.reliability < min_reliability {
            return false;
        }
    }
    if let Some(max_cost) = constraints.max_cost {
        if entry.metrics.cost > max_cost {
            return false;
        }
    }
    if let Some(max_hops) = constraints.max_hops {
        if entry.metrics.hop_count > max_hops {
            return false;
        }
    }
    if entry.path.iter().any(|n| constraints.avoid_nodes.contains(n)) {
        return false;
    }
    true
}

/// `getSelectionReason(selected, alternatives)` — spec §4.5. Distinct from
/// [`crate::load_balancer::LoadBalancer::select_optimal_path`]'s own reason
/// vocabulary, which governs that component's internal decisions only.
fn selection_reason(selected: &RouteEntry, alternatives: &[RouteEntry]) -> SelectionReason {
    match alternatives.first() {
        None => SelectionReason::OnlyOption,
        Some(top_alt) => {
            if selected.quality_score - top_alt.quality_score > 0.1 {
                SelectionReason::BestQuality
            } else {
                SelectionReason::LoadBalanced
            }
        }
    }
}

/// Forward lookup key — spec §6.3.
fn forward_key(request: &RoutingRequest) -> String {
    format!(
        "{}-{}-{}-{}",
        request.source, request.destination, request.service_type, request.qos_class.as_i32()
    )
}

fn optimal_path_to_metrics(path: &OptimalPath) -> RouteMetrics {
    RouteMetrics {
        latency: Duration::from_micros(path.latency_us.max(0.0) as u64),
        throughput: path.min_throughput,
        reliability: path.avg_reliability,
        cost: path.cost,
        hop_count: (path.node_ids.len().max(1) - 1) as u32,
        load: 0.5,
        jitter: Duration::from_micros(path.jitter_us.max(0.0) as u64),
        packet_loss: path.avg_packet_loss,
    }
}

fn route_entry_from_optimal_path(
    path: OptimalPath,
    qos: QosClass,
    confidence: f64,
    associations: serde_json::Value,
    now: Instant,
) -> Result<RouteEntry> {
    let metrics = optimal_path_to_metrics(&path);
    let quality = quality_score(&metrics, qos);
    RouteEntry::new(path.node_ids, metrics, quality, associations, confidence, now)
}

fn route_entry_from_solution(solution: RoutingSolution, now: Instant) -> Result<RouteEntry> {
    let metrics = optimal_path_to_metrics(&solution.path);
    RouteEntry::new(
        solution.path.node_ids,
        metrics,
        solution.fitness,
        serde_json::Value::Null,
        0.95,
        now,
    )
}

/// Aggregated statistics surface (spec §4.5 `stats()`).
#[derive(Debug, Clone)]
pub struct RoutingTableStats {
    pub total_lookups: u64,
    pub cache_hit_rate: f64,
    pub avg_latency: Duration,
    pub success_rate: f64,
    pub cached_routes: usize,
    pub invalidation_rate: f64,
    pub load_balance_rate: f64,
}

/// The ALM routing table: owns the cache, load balancer, and metrics
/// aggregator, and orchestrates lookups against the external collaborators
/// (spec §4.5).
pub struct RoutingTable {
    config: RoutingTableConfig,
    cache: RouteCache,
    load_balancer: LoadBalancer,
    metrics: MetricsAggregator,
    graph: Arc<dyn GraphSource>,
    search_engine: Arc<dyn SearchEngine>,
    optimizer: Arc<dyn PathOptimizer>,
    admission: Semaphore,
}

impl RoutingTable {
    pub fn new(
        config: RoutingTableConfig,
        graph: Arc<dyn GraphSource>,
        search_engine: Arc<dyn SearchEngine>,
        optimizer: Arc<dyn PathOptimizer>,
    ) -> Result<Self> {
        config.validate()?;
        let lb_config = LoadBalancerConfig {
            load_balance_threshold: config.load_balance_threshold,
            ..LoadBalancerConfig::default()
        };
        Ok(Self {
            cache: RouteCache::new(config.cache_size, config.cache_ttl),
            load_balancer: LoadBalancer::new(lb_config),
            metrics: MetricsAggregator::new(),
            admission: Semaphore::new(config.max_concurrent_lookups),
            config,
            graph,
            search_engine,
            optimizer,
        })
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.load_balancer
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Derive `min(config.search_timeout, context.deadline)` as a duration
    /// from `now` (spec §5 "Cancellation & timeouts").
    fn derive_timeout(&self, request: &RoutingRequest, now: Instant) -> Duration {
        match request.context.deadline {
            Some(deadline) => self.config.search_timeout.min(deadline.saturating_duration_since(now)),
            None => self.config.search_timeout,
        }
    }

    async fn discover(&self, request: &RoutingRequest, now: Instant) -> Result<Vec<RouteEntry>> {
        match self.config.optimization_level {
            OptimizationLevel::FastLookup => {
                let path = self
                    .graph
                    .find_shortest_path(request.source, request.destination)
                    .await
                    .map_err(|err| RoutingError::discovery_failed("graph", "find_shortest_path", err.to_string()))?;
                let entry = route_entry_from_optimal_path(
                    path,
                    request.qos_class,
                    0.8,
                    serde_json::Value::Null,
                    now,
                )?;
                Ok(vec![entry])
            }
            OptimizationLevel::Balanced => {
                let search_request = SearchRequest {
                    source: request.source,
                    destination: request.destination,
                    service_type: request.service_type.clone(),
                    qos_class: request.qos_class,
                    max_results: self.config.max_alternatives,
                    timeout: self.config.search_timeout,
                };
                let result = self
                    .search_engine
                    .search(search_request)
                    .await
                    .map_err(|err| RoutingError::discovery_failed("search_engine", "search", err.to_string()))?;
                let confidence = result.confidence;
                let mut entries = vec![route_entry_from_optimal_path(
                    result.best_path,
                    request.qos_class,
                    confidence,
                    result.associations,
                    now,
                )?];
                // Up to two alternative discoveries via the graph collaborator
                // (spec §4.5 step 4 "currently fast-graph with nondeterministic
                // perturbation"); this crate has no topology of its own to
                // perturb, so it takes the graph collaborator's single
                // deterministic path as one alternative, documented in
                // DESIGN.md.
                if let Ok(alt_path) = self.graph.find_shortest_path(request.source, request.destination).await {
                    if let Ok(alt) = route_entry_from_optimal_path(
                        alt_path,
                        request.qos_class,
                        0.7,
                        serde_json::Value::Null,
                        now,
                    ) {
                        entries.push(alt);
                    }
                }
                Ok(entries)
            }
            OptimizationLevel::Deep => {
                let opt_request = OptimizationRequest {
                    source: request.source,
                    target: request.destination,
                    objectives: vec!["latency".into(), "reliability".into(), "cost".into()],
                    max_solutions: self.config.max_alternatives,
                    time_limit: self.config.search_timeout,
                };
                let result = self
                    .optimizer
                    .optimize(opt_request)
                    .await
                    .map_err(|err| RoutingError::discovery_failed("optimizer", "optimize", err.to_string()))?;
                let mut entries = Vec::with_capacity(result.pareto_solutions.len());
                for solution in result.pareto_solutions {
                    entries.push(route_entry_from_solution(solution, now)?);
                }
                entries.truncate(self.config.max_alternatives);
                Ok(entries)
            }
        }
    }

    /// `select_optimal_route(candidates, request)` — spec §4.5 step 7.
    /// `candidates` must already be sorted by `quality_score` descending
    /// (spec §9 "first == best"); callers ensure this invariant before
    /// calling, rather than the load balancer's own ranking being consulted
    /// here.
    fn select_optimal_route(&self, mut candidates: Vec<RouteEntry>) -> (RouteEntry, Vec<RouteEntry>) {
        if candidates.len() == 1 {
            return (candidates.remove(0), Vec::new());
        }
        let primary = candidates.remove(0);
        let primary_load = self.load_balancer.get_path_load(&primary.path);
        if primary_load > self.config.load_balance_threshold {
            if let Some(swap_index) = candidates
                .iter()
                .position(|alt| self.load_balancer.get_path_load(&alt.path) < primary_load)
            {
                let selected = candidates.remove(swap_index);
                let mut alternatives = Vec::with_capacity(candidates.len() + 1);
                alternatives.push(primary);
                alternatives.extend(candidates);
                return (selected, alternatives);
            }
        }
        (primary, candidates)
    }

    /// Execute the full lookup pipeline (spec §4.5).
    pub async fn lookup_route(&self, request: &RoutingRequest) -> Result<RoutingResponse> {
        let start = Instant::now();

        // Step 1: validate.
        if request.source == request.destination
            || request.source.get() <= 0
            || request.destination.get() <= 0
        {
            return Err(RoutingError::invalid_request(
                "source and destination must be positive and distinct",
            ));
        }
        if request.context.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }

        let _permit = self
            .admission
            .try_acquire()
            .map_err(|_| RoutingError::Overloaded)?;

        // Step 2: compose cache key.
        let key = forward_key(request);

        // Step 3: cache probe.
        if let Some(entry) = self.cache.peek(&key) {
            if meets_constraints(&entry, &request.constraints) {
                // Re-fetch through `get` so access bookkeeping (last_used,
                // use_count) is applied under the cache's own writer
                // discipline.
                if let Some(entry) = self.cache.get(&key) {
                    self.metrics.record_cache_hit();
                    self.metrics.record_successful_lookup(start.elapsed());
                    return Ok(RoutingResponse {
                        confidence: entry.confidence,
                        route: entry,
                        alternatives: Vec::new(),
                        decision_time: start.elapsed(),
                        cache_hit: true,
                        load_balanced: false,
                        selected_reason: SelectionReason::BestQuality,
                    });
                }
            } else {
                self.cache.invalidate(&key);
                self.metrics.record_invalidation("constraints_stale");
            }
        }
        self.metrics.record_cache_miss();

        // Step 4: discover candidates, honoring the derived deadline.
        let derived_timeout = self.derive_timeout(request, start);
        let discovered = match timeout(derived_timeout, self.discover(request, start)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                // A collaborator error (not a timeout) is surfaced to the
                // caller rather than collapsed to `NotFound` (spec §7).
                warn!(error = %err, "route discovery failed");
                self.metrics.record_failed_lookup(start.elapsed());
                return Err(err);
            }
            Err(_) => {
                debug!("route discovery exceeded derived deadline");
                Vec::new()
            }
        };

        // Step 5: filter by constraints.
        let mut candidates: Vec<RouteEntry> = discovered
            .into_iter()
            .filter(|e| meets_constraints(e, &request.constraints))
            .collect();

        // Step 6: no candidates.
        if candidates.is_empty() {
            self.metrics.record_failed_lookup(start.elapsed());
            return Err(RoutingError::NotFound {
                destination: request.destination.get(),
            });
        }

        // spec §9 "first == best": the coordinator, not the discovery
        // strategy, is responsible for this invariant.
        candidates.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Step 7: select.
        let (selected, alternatives) = self.select_optimal_route(candidates);
        let reason = selection_reason(&selected, &alternatives);
        let load_balanced = !alternatives.is_empty();

        // Step 8: admit.
        self.cache.put(key, selected.clone());

        // Step 9: respond.
        self.metrics.record_successful_lookup(start.elapsed());
        Ok(RoutingResponse {
            decision_time: start.elapsed(),
            cache_hit: false,
            confidence: selected.confidence,
            route: selected,
            alternatives,
            load_balanced,
            selected_reason: reason,
        })
    }

    /// Feedback ingestion (spec §4.5 `update_route_metrics`).
    pub async fn update_route_metrics(&self, destination: NodeId, observed: RouteMetrics, success: bool) {
        const ALPHA: f64 = 0.1;
        if let Some(fingerprint) = self.cache.fingerprint_for_destination(destination) {
            if let Some(mut entry) = self.cache.peek(&fingerprint) {
                entry.metrics.latency = blend_duration(entry.metrics.latency, observed.latency, ALPHA);
                entry.metrics.throughput = blend(entry.metrics.throughput, observed.throughput, ALPHA);
                entry.metrics.reliability = blend(entry.metrics.reliability, observed.reliability, ALPHA);
                entry.metrics.cost = blend(entry.metrics.cost, observed.cost, ALPHA);
                if !success {
                    entry.metrics.reliability *= 0.9;
                    entry.confidence *= 0.95;
                }
                self.cache.put(fingerprint, entry);
            }
        }

        let reward = if success {
            1.0
        } else {
            let latency_term = 1.0 - observed.latency_us() / 10_000.0;
            let throughput_term = observed.throughput / 1_000.0;
            let cost_term = observed.cost / 100.0;
            (latency_term + throughput_term + observed.reliability - cost_term) / 4.0
        };
        self.search_engine.update(destination, observed, reward).await;

        self.load_balancer.update_metrics(destination, &observed, success);
        self.metrics.record_route_update(&observed, success);
    }

    /// Remove the cached entry for `destination`, recording `reason` (spec
    /// §4.5 `invalidate_route`).
    pub fn invalidate_route(&self, destination: NodeId, reason: impl Into<String>) {
        self.cache.invalidate_by_destination(destination);
        self.metrics.record_invalidation(reason.into());
    }

    pub fn stats(&self) -> RoutingTableStats {
        RoutingTableStats {
            total_lookups: self.metrics.total_lookups(),
            cache_hit_rate: self.metrics.cache_hit_rate(),
            avg_latency: self.metrics.average_latency(),
            success_rate: self.metrics.success_rate(),
            cached_routes: self.cache.size(),
            invalidation_rate: self.metrics.invalidation_rate(),
            load_balance_rate: self.load_balancer.stats().load_balance_rate(),
        }
    }
}

fn blend(prev: f64, observed: f64, alpha: f64) -> f64 {
    alpha * observed + (1.0 - alpha) * prev
}

fn blend_duration(prev: Duration, observed: Duration, alpha: f64) -> Duration {
    Duration::from_secs_f64(blend(prev.as_secs_f64(), observed.as_secs_f64(), alpha).max(0.0))
}
