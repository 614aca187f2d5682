#![allow(missing_docs, clippy::unwrap_used)]

use std::sync::Arc;

use alm_routing_core::{
    GraphSource, NodeId, OptimalPath, OptimizationLevel, OptimizationRequest, OptimizationResult,
    PathOptimizer, QosClass, RouteMetrics, RoutingRequest, RoutingTable, RoutingTableConfig,
    SearchEngine, SearchRequest, SearchResult,
};
use async_trait::async_trait;

struct ChainGraph;

#[async_trait]
impl GraphSource for ChainGraph {
    async fn find_shortest_path(
        &self,
        _source: NodeId,
        _destination: NodeId,
    ) -> alm_routing_core::Result<OptimalPath> {
        Ok(OptimalPath {
            node_ids: vec![NodeId::new(1).unwrap(), NodeId::new(2).unwrap(), NodeId::new(3).unwrap()],
            latency_us: 8_000.0,
            jitter_us: 150.0,
            cost: 1.0,
            avg_packet_loss: 0.0,
            min_throughput: 400.0,
            avg_reliability: 0.92,
        })
    }
}

struct NoSearchEngine;

#[async_trait]
impl SearchEngine for NoSearchEngine {
    async fn search(&self, _request: SearchRequest) -> alm_routing_core::Result<SearchResult> {
        Err(alm_routing_core::RoutingError::discovery_failed(
            "search_engine",
            "search",
            "demo does not wire a search engine",
        ))
    }

    async fn update(&self, _destination: NodeId, _observed: RouteMetrics, _reward: f64) {}
}

struct NoOptimizer;

#[async_trait]
impl PathOptimizer for NoOptimizer {
    async fn optimize(&self, _request: OptimizationRequest) -> alm_routing_core::Result<OptimizationResult> {
        Ok(OptimizationResult {
            pareto_solutions: Vec::new(),
        })
    }
}

#[tokio::main]
async fn main() {
    let table = RoutingTable::new(
        RoutingTableConfig {
            optimization_level: OptimizationLevel::FastLookup,
            ..RoutingTableConfig::default()
        },
        Arc::new(ChainGraph),
        Arc::new(NoSearchEngine),
        Arc::new(NoOptimizer),
    )
    .expect("valid config");

    let request = RoutingRequest::new(
        NodeId::new(1).unwrap(),
        NodeId::new(3).unwrap(),
        "api",
        QosClass::BestEffort,
    );

    let response = table.lookup_route(&request).await.expect("route found");
    println!(
        "path={:?} reason={} cache_hit={}",
        response.route.path, response.selected_reason, response.cache_hit
    );

    let again = table.lookup_route(&request).await.expect("route found");
    println!("second lookup cache_hit={}", again.cache_hit);

    let stats = table.stats();
    println!(
        "total_lookups={} cache_hit_rate={:.1}%",
        stats.total_lookups, stats.cache_hit_rate
    );
}
