use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// ImportMetrics はインポートパイプラインの Prometheus メトリクス。
pub struct ImportMetrics {
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
    pub jobs_total: IntCounterVec,
    pub rows_total: IntCounterVec,
    pub batch_duration: HistogramVec,
    registry: Registry,
}

const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const BATCH_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

impl ImportMetrics {
    /// service_name はメトリクスの service ラベルに使用される。
    #[allow(clippy::expect_used)]
    pub fn new(service_name: &str) -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests")
                .const_label("service", service_name),
            &["method", "path", "status"],
        )
        .expect("failed to create http_requests_total counter");

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Histogram of HTTP request latency",
            )
            .const_label("service", service_name)
            .buckets(DEFAULT_BUCKETS.to_vec()),
            &["method", "path"],
        )
        .expect("failed to create http_request_duration histogram");

        let jobs_total = IntCounterVec::new(
            Opts::new(
                "catalog_import_jobs_total",
                "Total number of import jobs reaching each status",
            )
            .const_label("service", service_name),
            &["status"],
        )
        .expect("failed to create catalog_import_jobs_total counter");

        let rows_total = IntCounterVec::new(
            Opts::new(
                "catalog_import_rows_total",
                "Total number of import rows by phase and outcome",
            )
            .const_label("service", service_name),
            &["phase", "outcome"],
        )
        .expect("failed to create catalog_import_rows_total counter");

        let batch_duration = HistogramVec::new(
            HistogramOpts::new(
                "catalog_import_batch_duration_seconds",
                "Histogram of import batch processing latency",
            )
            .const_label("service", service_name)
            .buckets(BATCH_BUCKETS.to_vec()),
            &["phase"],
        )
        .expect("failed to create catalog_import_batch_duration_seconds histogram");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("failed to register http_requests_total");
        registry
            .register(Box::new(http_request_duration.clone()))
            .expect("failed to register http_request_duration");
        registry
            .register(Box::new(jobs_total.clone()))
            .expect("failed to register catalog_import_jobs_total");
        registry
            .register(Box::new(rows_total.clone()))
            .expect("failed to register catalog_import_rows_total");
        registry
            .register(Box::new(batch_duration.clone()))
            .expect("failed to register catalog_import_batch_duration_seconds");

        Self {
            http_requests_total,
            http_request_duration,
            jobs_total,
            rows_total,
            batch_duration,
            registry,
        }
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: &str, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[method, path, status])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_job_status(&self, status: &str) {
        self.jobs_total.with_label_values(&[status]).inc();
    }

    pub fn record_rows(&self, phase: &str, outcome: &str, count: u64) {
        if count > 0 {
            self.rows_total
                .with_label_values(&[phase, outcome])
                .inc_by(count);
        }
    }

    pub fn record_batch_duration(&self, phase: &str, duration_secs: f64) {
        self.batch_duration
            .with_label_values(&[phase])
            .observe(duration_secs);
    }

    /// Prometheus テキストフォーマットでメトリクスを返す。
    pub fn gather_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_import_metrics() {
        let metrics = ImportMetrics::new("test-service");
        metrics.record_job_status("VALIDATED");
        metrics.record_rows("validation", "staged", 3);
        metrics.record_batch_duration("commit", 0.2);
        let text = metrics.gather_metrics();
        assert!(text.contains("catalog_import_jobs_total"));
        assert!(text.contains("status=\"VALIDATED\""));
        assert!(text.contains("catalog_import_rows_total"));
        assert!(text.contains("catalog_import_batch_duration_seconds"));
    }

    #[test]
    fn test_zero_row_count_is_not_recorded() {
        let metrics = ImportMetrics::new("test-service");
        metrics.record_rows("commit", "failed", 0);
        assert!(!metrics.gather_metrics().contains("outcome=\"failed\""));
    }
}
