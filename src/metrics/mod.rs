//! Metrics and monitoring for the elo-arena service
//!
//! Prometheus counters and histograms for served pairs, votes, scans and
//! deletions. Exposed over HTTP by the service layer at `/metrics`.

pub mod collector;

pub use collector::{
    CollectionMetrics, ComparisonMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics,
};

use prometheus::{Encoder, TextEncoder};

/// Render every registered metric in the Prometheus text format
pub fn encode_text(collector: &MetricsCollector) -> anyhow::Result<(String, String)> {
    let metric_families = collector.registry().gather();
    let encoder = TextEncoder::new();
    let body = encoder.encode_to_string(&metric_families)?;
    Ok((encoder.format_type().to_string(), body))
}
