//! In-memory fakes for the external collaborator traits, used by this
//! crate's own test suite. Not part of the public API.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use crate::collaborators::{
    GraphSource, OptimalPath, OptimizationRequest, OptimizationResult, PathOptimizer,
    RoutingSolution, SearchEngine, SearchRequest, SearchResult,
};
use crate::error::{Result, RoutingError};
use crate::types::{NodeId, RouteMetrics};

/// A graph source backed by a fixed `(source, destination) -> path` table.
pub struct FakeGraphSource {
    paths: HashMap<(NodeId, NodeId), OptimalPath>,
}

impl FakeGraphSource {
    pub fn new() -> Self {
        Self {
            paths: HashMap::new(),
        }
    }

    pub fn with_path(mut self, source: NodeId, destination: NodeId, path: OptimalPath) -> Self {
        self.paths.insert((source, destination), path);
        self
    }
}

impl Default for FakeGraphSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphSource for FakeGraphSource {
    async fn find_shortest_path(&self, source: NodeId, destination: NodeId) -> Result<OptimalPath> {
        self.paths
            .get(&(source, destination))
            .cloned()
            .ok_or_else(|| {
                RoutingError::discovery_failed(
                    "graph_source",
                    "find_shortest_path",
                    format!("no path {source} -> {destination}"),
                )
            })
    }
}

/// A search engine backed by a fixed `destination -> result` table; records
/// every `update` call for assertion.
pub struct FakeSearchEngine {
    results: HashMap<NodeId, SearchResult>,
    updates: Mutex<Vec<(NodeId, RouteMetrics, f64)>>,
}

impl FakeSearchEngine {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(mut self, destination: NodeId, result: SearchResult) -> Self {
        self.results.insert(destination, result);
        self
    }

    pub fn recorded_updates(&self) -> Vec<(NodeId, RouteMetrics, f64)> {
        self.updates.lock().clone()
    }
}

impl Default for FakeSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for FakeSearchEngine {
    async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        self.results
            .get(&request.destination)
            .cloned()
            .ok_or_else(|| {
                RoutingError::discovery_failed(
                    "search_engine",
                    "search",
                    format!("no result for destination {}", request.destination),
                )
            })
    }

    async fn update(&self, destination: NodeId, observed: RouteMetrics, reward: f64) {
        self.updates.lock().push((destination, observed, reward));
    }
}

/// A path optimizer backed by a fixed `(source, target) -> solutions` table.
pub struct FakePathOptimizer {
    solutions: HashMap<(NodeId, NodeId), Vec<RoutingSolution>>,
}

impl FakePathOptimizer {
    pub fn new() -> Self {
        Self {
            solutions: HashMap::new(),
        }
    }

    pub fn with_solutions(
        mut self,
        source: NodeId,
        target: NodeId,
        solutions: Vec<RoutingSolution>,
    ) -> Self {
        self.solutions.insert((source, target), solutions);
        self
    }
}

impl Default for FakePathOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PathOptimizer for FakePathOptimizer {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult> {
        let pareto_solutions = self
            .solutions
            .get(&(request.source, request.target))
            .cloned()
            .unwrap_or_default();
        Ok(OptimizationResult { pareto_solutions })
    }
}

/// Build a simple straight-line `OptimalPath` with uniform per-hop metrics.
pub fn simple_path(node_ids: Vec<NodeId>, latency_us: f64, reliability: f64) -> OptimalPath {
    OptimalPath {
        node_ids,
        latency_us,
        jitter_us: 100.0,
        cost: 1.0,
        avg_packet_loss: 0.01,
        min_throughput: 500.0,
        avg_reliability: reliability,
    }
}

pub fn simple_search_result(path: OptimalPath, confidence: f64) -> SearchResult {
    SearchResult {
        best_path: path,
        associations: Value::Null,
        confidence,
    }
}
