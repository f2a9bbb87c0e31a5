//! vindexer-api - HTTP surface of the vote indexer
//!
//! Vote queries, reward claims, indexer administration, health, metrics and
//! a server-sent live feed of recent votes.

pub mod cli;
pub mod health;
pub mod live_feed;
pub mod rest;
pub mod types;
pub mod vote_endpoints;

pub use health::HealthService;
pub use rest::{ApiConfig, ApiServer, AppState};
pub use types::{ApiError, ApiResponse, HealthCheckResult, HealthResponse, HealthStatus};
