//! Prometheus metrics for the indexer, exposed through the HTTP layer

pub mod exporter;
pub mod metrics;

pub use exporter::gather_text;
