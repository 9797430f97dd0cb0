//! Metrics for deprecation detections and notification deliveries.
//!
//! Provides Prometheus counters for deprecated operations seen by the
//! client and for the outcome of each sink.

use prometheus::{IntCounterVec, Opts, Registry};

/// Metrics collector for deprecation detection.
#[derive(Clone)]
pub struct DeprecationMetrics {
    /// Registry for all metrics
    registry: Registry,

    /// Counter for detected deprecations
    pub detections_total: IntCounterVec,

    /// Counter for sink outcomes (sent or duplicate)
    pub notifications_total: IntCounterVec,

    /// Counter for failed sink deliveries
    pub notification_errors_total: IntCounterVec,
}

impl DeprecationMetrics {
    /// Create a new metrics collector with the given prefix.
    pub fn new(prefix: &str) -> Self {
        let registry = Registry::new();

        let detections_total = IntCounterVec::new(
            Opts::new(
                format!("{}_detections_total", prefix),
                "Total number of requests to deprecated operations or with deprecated parameters",
            ),
            &["method", "path", "kind"],
        )
        .expect("Failed to create detections_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                format!("{}_notifications_total", prefix),
                "Total number of deprecation notifications by sink and outcome",
            ),
            &["sink", "outcome"],
        )
        .expect("Failed to create notifications_total metric");

        let notification_errors_total = IntCounterVec::new(
            Opts::new(
                format!("{}_notification_errors_total", prefix),
                "Total number of failed deprecation notifications by sink",
            ),
            &["sink"],
        )
        .expect("Failed to create notification_errors_total metric");

        // Register all metrics
        registry
            .register(Box::new(detections_total.clone()))
            .expect("Failed to register detections_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("Failed to register notifications_total");
        registry
            .register(Box::new(notification_errors_total.clone()))
            .expect("Failed to register notification_errors_total");

        Self {
            registry,
            detections_total,
            notifications_total,
            notification_errors_total,
        }
    }

    /// Record a detected deprecation. `kind` is `operation` or `parameter`.
    pub fn record_detection(&self, method: &str, path: &str, kind: &str) {
        self.detections_total
            .with_label_values(&[method, path, kind])
            .inc();
    }

    /// Record a sink outcome.
    pub fn record_notification(&self, sink: &str, outcome: &str) {
        self.notifications_total
            .with_label_values(&[sink, outcome])
            .inc();
    }

    /// Record a failed sink delivery.
    pub fn record_notification_error(&self, sink: &str) {
        self.notification_errors_total
            .with_label_values(&[sink])
            .inc();
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for DeprecationMetrics {
    fn default() -> Self {
        Self::new("openapi_deprecation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = DeprecationMetrics::new("test");
        // Record a value to initialize the metric
        metrics.record_detection("GET", "/users", "operation");
        assert!(!metrics.encode().is_empty());
    }

    #[test]
    fn test_record_detection() {
        let metrics = DeprecationMetrics::new("test");
        metrics.record_detection("GET", "/users", "parameter");

        let output = metrics.encode();
        assert!(output.contains("test_detections_total"));
        assert!(output.contains("kind=\"parameter\""));
    }

    #[test]
    fn test_record_notification() {
        let metrics = DeprecationMetrics::new("test");
        metrics.record_notification("slack", "sent");
        metrics.record_notification("slack", "sent");
        metrics.record_notification_error("jira");

        let output = metrics.encode();
        let sent = output
            .lines()
            .find(|l| l.starts_with("test_notifications_total{") && l.contains("sink=\"slack\""))
            .unwrap();
        assert!(sent.contains("outcome=\"sent\""));
        assert!(sent.ends_with(" 2"));
        assert!(output.contains("test_notification_errors_total{sink=\"jira\"} 1"));
    }

    #[test]
    fn test_registry_gathers_all_families() {
        let metrics = DeprecationMetrics::default();
        metrics.record_detection("GET", "/users", "operation");
        metrics.record_notification("log", "sent");
        metrics.record_notification_error("slack");
        assert_eq!(metrics.registry().gather().len(), 3);
    }
}
