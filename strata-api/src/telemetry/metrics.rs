//! Prometheus Metrics Definitions
//!
//! Defines the Strata engine metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Engine operation latency buckets (seconds). Imports and exports run long.
const ENGINE_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<StrataMetrics>> = Lazy::new(StrataMetrics::new);

/// Container for all Strata metrics.
#[derive(Clone)]
pub struct StrataMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Engine operation counter - labels: operation, status
    pub engine_operations_total: CounterVec,

    /// Engine operation duration histogram - labels: operation
    pub engine_operation_duration_seconds: HistogramVec,

    /// Schema reload notifications - labels: status (sent/failed)
    pub schema_notifications_total: CounterVec,
}

impl StrataMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "strata_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "strata_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            engine_operations_total: register_counter_vec!(
                "strata_engine_operations_total",
                "Total number of schema and SQL engine operations",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register engine_operations_total: {}", e)))?,

            engine_operation_duration_seconds: register_histogram_vec!(
                "strata_engine_operation_duration_seconds",
                "Engine operation duration in seconds",
                &["operation"],
                ENGINE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register engine_operation_duration_seconds: {}", e)))?,

            schema_notifications_total: register_counter_vec!(
                "strata_schema_notifications_total",
                "Schema cache reload notifications",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register schema_notifications_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record an engine operation.
    pub fn record_engine_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.engine_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.engine_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record a schema reload notification.
    pub fn record_schema_notification(&self, sent: bool) {
        let status = if sent { "sent" } else { "failed" };
        self.schema_notifications_total
            .with_label_values(&[status])
            .inc();
    }
}

/// Time `fut` and record it under `operation`.
pub async fn observe<T, E, F>(operation: &str, fut: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = fut.await;
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_engine_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());
    }
    result
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the lazy registry so the families exist before the first request.
    let _ = METRICS.as_ref();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_engine_operation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_engine_operation("create_table", true, 0.005);
        metrics.record_engine_operation("raw_sql", false, 0.010);
        let count = metrics
            .engine_operations_total
            .with_label_values(&["create_table", "success"])
            .get();
        assert!(count >= 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_observe_passes_result_through() {
        let ok: Result<u32, String> = observe("unit_test_op", async { Ok(3) }).await;
        assert_eq!(ok, Ok(3));
        let err: Result<u32, String> = observe("unit_test_op", async { Err("x".to_string()) }).await;
        assert!(err.is_err());
    }

    #[test]
    fn test_notification_metrics() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_schema_notification(true);
        metrics.record_schema_notification(false);
        Ok(())
    }
}
