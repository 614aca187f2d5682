//! Core value types: node identifiers, route metrics, requests and
//! responses, and the cached route entry itself (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{Result, RoutingError};

/// A positive, non-zero node identifier.
///
/// Mirrors the teacher crate's habit of wrapping bare integer identifiers
/// (`StreamId`, `ConnectionId`) in a validated newtype instead of passing
/// raw `i64` around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(i64);

impl NodeId {
    /// Construct a `NodeId`, rejecting non-positive values.
    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(RoutingError::invalid_request(format!(
                "node id must be positive, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// The underlying integer value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for NodeId {
    type Error = RoutingError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

/// Coarse service intent; parameterizes the quality-score formula (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    BestEffort,
    LowLatency,
    HighThroughput,
    HighReliability,
    CriticalMission,
}

impl QosClass {
    /// Stable integer tag used by the cache key scheme (§6.3) and by the
    /// search engine collaborator's wire-level `qos_class: int` field.
    pub fn as_i32(self) -> i32 {
        match self {
            QosClass::BestEffort => 0,
            QosClass::LowLatency => 1,
            QosClass::HighThroughput => 2,
            QosClass::HighReliability => 3,
            QosClass::CriticalMission => 4,
        }
    }
}

/// `(latency, throughput, reliability, cost, hop_count, load, jitter, packet_loss)` — spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub latency: Duration,
    /// Operator-chosen but consistent throughput unit (e.g. MB/s).
    pub throughput: f64,
    /// In `[0, 1]`.
    pub reliability: f64,
    pub cost: f64,
    pub hop_count: u32,
    /// In `[0, 1]`.
    pub load: f64,
    pub jitter: Duration,
    /// In `[0, 1]`.
    pub packet_loss: f64,
}

impl RouteMetrics {
    /// Latency in whole microseconds, the unit the quality-score and
    /// load-score formulas operate on.
    pub fn latency_us(&self) -> f64 {
        self.latency.as_micros() as f64
    }
}

/// Optional upper/lower bounds plus hard exclusions on a routing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub max_latency: Option<Duration>,
    pub min_throughput: Option<f64>,
    pub min_reliability: Option<f64>,
    pub max_cost: Option<f64>,
    pub max_hops: Option<u32>,
    #[serde(default)]
    pub avoid_nodes: HashSet<NodeId>,
    #[serde(default)]
    pub prefer_regions: Vec<String>,
}

/// Cancellation + deadline context carried with a request.
///
/// Modeled the way the teacher threads cancellation through its async
/// subsystems: a cheap, cloneable signal plus an absolute deadline, rather
/// than a bespoke context object per call site.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancelled: std::sync::Arc<std::sync::atomic::AtomicBool>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline and no cancellation requested.
    pub fn new() -> Self {
        Self {
            cancelled: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Signal cancellation; observable by any clone of this context.
    pub fn cancel(&self) {
        self.cancelled
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// `(source, destination, service_type, qos_class, constraints, context)` — spec §3.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub source: NodeId,
    pub destination: NodeId,
    pub service_type: String,
    pub qos_class: QosClass,
    pub constraints: Constraints,
    pub context: RequestContext,
}

impl RoutingRequest {
    pub fn new(
        source: NodeId,
        destination: NodeId,
        service_type: impl Into<String>,
        qos_class: QosClass,
    ) -> Self {
        Self {
            source,
            destination,
            service_type: service_type.into(),
            qos_class,
            constraints: Constraints::default(),
            context: RequestContext::new(),
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Why a particular route was chosen; see spec §3 and §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    OnlyOption,
    BestQuality,
    BestScore,
    LoadBalanced,
    SingleOption,
    NoCandidates,
}

impl SelectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionReason::OnlyOption => "only_option",
            SelectionReason::BestQuality => "best_quality",
            SelectionReason::BestScore => "best_score",
            SelectionReason::LoadBalanced => "load_balanced",
            SelectionReason::SingleOption => "single_option",
            SelectionReason::NoCandidates => "no_candidates",
        }
    }
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached route from `path[0]` to `path[len-1]` (spec §3).
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub path: Vec<NodeId>,
    pub metrics: RouteMetrics,
    pub quality_score: f64,
    pub created_at: Instant,
    pub last_used: Instant,
    pub use_count: u64,
    /// Opaque learning metadata supplied by the search engine; passed through
    /// untouched by the core.
    pub associations: Value,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl RouteEntry {
    /// Build a new entry, enforcing the invariants of spec §3. Violations
    /// are rejected rather than silently repaired.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: Vec<NodeId>,
        metrics: RouteMetrics,
        quality_score: f64,
        associations: Value,
        confidence: f64,
        now: Instant,
    ) -> Result<Self> {
        if path.len() < 2 {
            return Err(RoutingError::invalid_request(
                "route path must contain at least source and destination",
            ));
        }
        let mut seen = HashSet::with_capacity(path.len());
        for node in &path {
            if !seen.insert(*node) {
                return Err(RoutingError::invalid_request(format!(
                    "route path revisits node {node}"
                )));
            }
        }
        let destination = *path.last().unwrap();
        let next_hop = path[1];
        let hop_count = (path.len() - 1) as u32;
        if metrics.hop_count != hop_count {
            return Err(RoutingError::invalid_request(format!(
                "hop_count {} does not match path length {}",
                metrics.hop_count, hop_count
            )));
        }
        Ok(Self {
            destination,
            next_hop,
            path,
            metrics,
            quality_score,
            created_at: now,
            last_used: now,
            use_count: 0,
            associations,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// `path[0]`, i.e. the source this route was discovered for.
    pub fn source(&self) -> NodeId {
        self.path[0]
    }

    /// Record bookkeeping for one successful retrieval.
    pub fn record_access(&mut self, now: Instant) {
        self.last_used = now;
        self.use_count += 1;
    }
}

/// Outcome of a `lookup_route` call (spec §3).
#[derive(Debug, Clone)]
pub struct RoutingResponse {
    pub route: RouteEntry,
    pub alternatives: Vec<RouteEntry>,
    pub decision_time: Duration,
    pub cache_hit: bool,
    pub confidence: f64,
    pub load_balanced: bool,
    pub selected_reason: SelectionReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(v: i64) -> NodeId {
        NodeId::new(v).unwrap()
    }

    #[test]
    fn node_id_rejects_non_positive() {
        assert!(NodeId::new(0).is_err());
        assert!(NodeId::new(-1).is_err());
        assert!(NodeId::new(1).is_ok());
    }

    #[test]
    fn route_entry_enforces_path_invariants() {
        let now = Instant::now();
        let metrics = RouteMetrics {
            latency: Duration::from_millis(5),
            throughput: 10.0,
            reliability: 0.9,
            cost: 1.0,
            hop_count: 2,
            load: 0.1,
            jitter: Duration::from_millis(1),
            packet_loss: 0.0,
        };
        let entry = RouteEntry::new(
            vec![node(1), node(2), node(3)],
            metrics,
            0.8,
            Value::Null,
            0.9,
            now,
        )
        .unwrap();
        assert_eq!(entry.destination, node(3));
        assert_eq!(entry.next_hop, node(2));
        assert_eq!(entry.source(), node(1));

        let dup_path = vec![node(1), node(2), node(1)];
        let bad_metrics = metrics;
        assert!(RouteEntry::new(dup_path, bad_metrics, 0.8, Value::Null, 0.9, now).is_err());
    }
}
