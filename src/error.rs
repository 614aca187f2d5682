use thiserror::Error;

/// Result alias used throughout the routing core.
pub type Result<T, E = RoutingError> = core::result::Result<T, E>;

/// Error taxonomy for the routing core (see spec §7).
#[derive(Debug, Error)]
pub enum RoutingError {
    /// `source == destination`, or either node id is non-positive.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No route survived discovery and constraint filtering.
    #[error("no route found for destination {destination}")]
    NotFound {
        /// The destination that could not be routed to.
        destination: i64,
    },

    /// An external collaborator returned an error or timed out.
    #[error("discovery failed: {collaborator}::{operation}: {reason}")]
    DiscoveryFailed {
        /// Which collaborator failed (`"graph"`, `"search_engine"`, `"optimizer"`).
        collaborator: &'static str,
        /// Which operation on that collaborator failed.
        operation: &'static str,
        /// Human-readable diagnostic.
        reason: String,
    },

    /// The request's context was cancelled before a route could be produced.
    #[error("lookup cancelled")]
    Cancelled,

    /// `max_concurrent_lookups` admission limit was reached.
    #[error("routing table overloaded")]
    Overloaded,

    /// Configuration failed validation.
    #[error("config: {0}")]
    Config(String),
}

impl RoutingError {
    /// Build an [`RoutingError::InvalidRequest`] from any displayable message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Build a [`RoutingError::Config`] from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a collaborator failure with its origin for diagnostics.
    pub fn discovery_failed(
        collaborator: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::DiscoveryFailed {
            collaborator,
            operation,
            reason: reason.into(),
        }
    }
}
