//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the elo-arena service using
//! Prometheus metrics.

use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Comparison-related metrics
    comparison_metrics: ComparisonMetrics,

    /// Collection-related metrics
    collection_metrics: CollectionMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Comparison-related metrics
#[derive(Clone)]
pub struct ComparisonMetrics {
    /// Pairs handed out for comparison
    pub pairs_served_total: IntCounterVec,

    /// Votes recorded
    pub votes_total: IntCounterVec,

    /// Requests rejected, by reason
    pub rejected_total: IntCounterVec,
}

/// Collection-related metrics
#[derive(Clone)]
pub struct CollectionMetrics {
    /// Items registered by a scan
    pub items_added_total: IntCounterVec,

    /// Items left unrated because no tag was found
    pub items_skipped_total: IntCounterVec,

    /// Items deleted on request
    pub items_deleted_total: IntCounterVec,

    /// Rated items per collection
    pub rated_items: IntGaugeVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of engine operations
    pub operation_duration: HistogramVec,

    /// Duration of snapshot writes
    pub persist_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let comparison_metrics = ComparisonMetrics::new(&registry)?;
        let collection_metrics = CollectionMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            comparison_metrics,
            collection_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn comparison(&self) -> &ComparisonMetrics {
        &self.comparison_metrics
    }

    pub fn collection(&self) -> &CollectionMetrics {
        &self.collection_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a pair handed out for comparison
    pub fn record_pair_served(&self, subset: &str) {
        self.comparison_metrics
            .pairs_served_total
            .with_label_values(&[subset])
            .inc();
    }

    /// Record a vote
    pub fn record_vote(&self, subset: &str) {
        self.comparison_metrics
            .votes_total
            .with_label_values(&[subset])
            .inc();
    }

    /// Record a request refused by the engine
    pub fn record_rejection(&self, reason: &str) {
        self.comparison_metrics
            .rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record the outcome of a scan
    pub fn record_sync(&self, subset: &str, added: usize, skipped: usize, rated: usize) {
        self.collection_metrics
            .items_added_total
            .with_label_values(&[subset])
            .inc_by(added as u64);
        self.collection_metrics
            .items_skipped_total
            .with_label_values(&[subset])
            .inc_by(skipped as u64);
        self.collection_metrics
            .rated_items
            .with_label_values(&[subset])
            .set(rated as i64);
    }

    /// Record an item deletion
    pub fn record_deletion(&self, subset: &str, rated: usize) {
        self.collection_metrics
            .items_deleted_total
            .with_label_values(&[subset])
            .inc();
        self.collection_metrics
            .rated_items
            .with_label_values(&[subset])
            .set(rated as i64);
    }

    /// Record the duration of an engine operation
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record the duration of a snapshot write
    pub fn record_persist(&self, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.performance_metrics
            .persist_duration
            .with_label_values(&[status])
            .observe(duration.as_secs_f64());
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ComparisonMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairs_served_total = IntCounterVec::new(
            Opts::new("arena_pairs_served_total", "Pairs served for comparison"),
            &["subset"],
        )?;
        registry.register(Box::new(pairs_served_total.clone()))?;

        let votes_total = IntCounterVec::new(
            Opts::new("arena_votes_total", "Votes recorded"),
            &["subset"],
        )?;
        registry.register(Box::new(votes_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("arena_rejected_total", "Requests rejected by the engine"),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        Ok(Self {
            pairs_served_total,
            votes_total,
            rejected_total,
        })
    }
}

impl CollectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let items_added_total = IntCounterVec::new(
            Opts::new("arena_items_added_total", "Items registered by a scan"),
            &["subset"],
        )?;
        registry.register(Box::new(items_added_total.clone()))?;

        let items_skipped_total = IntCounterVec::new(
            Opts::new(
                "arena_items_skipped_total",
                "Items skipped because no tag was found",
            ),
            &["subset"],
        )?;
        registry.register(Box::new(items_skipped_total.clone()))?;

        let items_deleted_total = IntCounterVec::new(
            Opts::new("arena_items_deleted_total", "Items deleted on request"),
            &["subset"],
        )?;
        registry.register(Box::new(items_deleted_total.clone()))?;

        let rated_items = IntGaugeVec::new(
            Opts::new("arena_rated_items", "Rated items per collection"),
            &["subset"],
        )?;
        registry.register(Box::new(rated_items.clone()))?;

        Ok(Self {
            items_added_total,
            items_skipped_total,
            items_deleted_total,
            rated_items,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "arena_operation_duration_seconds",
                "Engine operation duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let persist_duration = HistogramVec::new(
            HistogramOpts::new(
                "arena_persist_duration_seconds",
                "Snapshot write duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["status"],
        )?;
        registry.register(Box::new(persist_duration.clone()))?;

        Ok(Self {
            operation_duration,
            persist_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_pair_served("portraits");
        collector.record_sync("portraits", 3, 1, 3);

        let names: Vec<String> = collector
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"arena_pairs_served_total".to_string()));
        assert!(names.contains(&"arena_items_added_total".to_string()));
        assert!(names.contains(&"arena_rated_items".to_string()));
    }

    #[test]
    fn test_vote_and_pair_counters() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_pair_served("portraits");
        collector.record_pair_served("portraits");
        collector.record_vote("portraits");

        assert_eq!(
            collector
                .comparison()
                .pairs_served_total
                .with_label_values(&["portraits"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .comparison()
                .votes_total
                .with_label_values(&["portraits"])
                .get(),
            1
        );
    }

    #[test]
    fn test_sync_and_deletion_gauges() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_sync("portraits", 3, 1, 3);
        collector.record_deletion("portraits", 2);

        let collection = collector.collection();
        assert_eq!(
            collection
                .items_added_total
                .with_label_values(&["portraits"])
                .get(),
            3
        );
        assert_eq!(
            collection.rated_items.with_label_values(&["portraits"]).get(),
            2
        );
    }

    #[test]
    fn test_registry_exposes_families() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_operation("vote", Duration::from_millis(2));
        collector.record_persist(true, Duration::from_millis(1));
        collector.record_rejection("insufficient_items");

        let names: Vec<String> = collector
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"arena_operation_duration_seconds".to_string()));
        assert!(names.contains(&"arena_rejected_total".to_string()));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
