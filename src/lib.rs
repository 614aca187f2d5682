#![forbid(unsafe_code)]

//! Associative learning-based routing core.
//!
//! Maintains a per-destination cache of precomputed routes, selects an
//! optimal route for each lookup subject to QoS class and hard constraints,
//! load-balances among candidates based on live telemetry, and folds
//! observed route performance back into the model via exponentially
//! weighted moving averages.
//!
//! The network graph, the associative search engine, and the
//! multi-objective optimizer are external collaborators (see
//! [`collaborators`]) — this crate owns only their interfaces, not their
//! implementations.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod ema;
pub mod error;
pub mod load_balancer;
pub mod metrics;
pub mod routing_table;
pub mod types;

#[cfg(test)]
pub mod testutil;

pub use cache::{CacheStats, RouteCache};
pub use collaborators::{
    GraphSource, OptimalPath, OptimizationRequest, OptimizationResult, PathOptimizer,
    RoutingSolution, SearchEngine, SearchRequest, SearchResult,
};
pub use config::{OptimizationLevel, RoutingTableConfig};
pub use ema::Ema;
pub use error::{Result, RoutingError};
pub use load_balancer::{
    HealthTelemetry, LoadBalancer, LoadBalancerConfig, LoadBalancerStats, NodeLoadInfo,
    PathLoadInfo, PathSelectionDecision,
};
pub use metrics::{HealthAssessment, LatencyPercentiles, MetricsAggregator, MetricsReport};
pub use routing_table::{meets_constraints, quality_score, RoutingTable, RoutingTableStats};
pub use types::{
    Constraints, NodeId, QosClass, RequestContext, RouteEntry, RouteMetrics, RoutingRequest,
    RoutingResponse, SelectionReason,
};
