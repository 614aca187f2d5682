//! External collaborator interfaces (spec §6).
//!
//! The graph search, the associative search engine, and the multi-objective
//! optimizer are out of scope for this crate (spec §1); it only needs their
//! shapes. These are expressed as `async_trait` capability abstractions, the
//! same pattern the teacher crate uses for its DHT peer-discovery
//! abstraction in `nyx-daemon::path_builder`, so that process wiring can
//! plug in real implementations while the core stays ignorant of them.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::types::{NodeId, QosClass};

/// A shortest path as reported by the graph collaborator (§6.1).
#[derive(Debug, Clone)]
pub struct OptimalPath {
    /// Ordered node ids from source to destination, inclusive.
    pub node_ids: Vec<NodeId>,
    pub latency_us: f64,
    pub jitter_us: f64,
    pub cost: f64,
    pub avg_packet_loss: f64,
    pub min_throughput: f64,
    pub avg_reliability: f64,
}

/// A request to the associative search engine collaborator (§6.2).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source: NodeId,
    pub destination: NodeId,
    pub service_type: String,
    pub qos_class: QosClass,
    pub max_results: usize,
    pub timeout: Duration,
}

/// Response from the associative search engine collaborator (§6.2).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_path: OptimalPath,
    pub associations: Value,
    pub confidence: f64,
}

/// A single Pareto-optimal candidate from the optimizer collaborator (§6.4).
#[derive(Debug, Clone)]
pub struct RoutingSolution {
    pub path: OptimalPath,
    /// Used directly as the resulting `RouteEntry::quality_score`.
    pub fitness: f64,
}

/// A request to the multi-objective optimizer collaborator (§6.4).
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub source: NodeId,
    pub target: NodeId,
    pub objectives: Vec<String>,
    pub max_solutions: usize,
    pub time_limit: Duration,
}

/// Response from the multi-objective optimizer collaborator (§6.4).
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub pareto_solutions: Vec<RoutingSolution>,
}

/// The network graph and its shortest-path algorithm (§6.1). Out of scope
/// for this crate's own implementation — only the interface is owned here.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn find_shortest_path(
        &self,
        source: NodeId,
        destination: NodeId,
    ) -> Result<OptimalPath>;
}

/// The associative search engine that returns learned paths (§6.2).
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchResult>;

    /// Advisory reward feedback; the engine's internal state is not
    /// constrained by this crate (spec §4.5).
    async fn update(&self, destination: NodeId, observed: crate::types::RouteMetrics, reward: f64);
}

/// The multi-objective Pareto optimizer (§6.4).
#[async_trait]
pub trait PathOptimizer: Send + Sync {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult>;
}
