// Prometheus metrics for the web front-end.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Backend calls, by operation and status ("error" when no response came back).
    pub static ref BACKEND_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codestrain_backend_requests_total", "Total backend API calls"),
        &["operation", "status"],
    )
    .unwrap();

    /// Form actions that ended in a structured failure, by action and status.
    pub static ref ACTION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codestrain_action_failures_total", "Form actions that failed"),
        &["action", "status"],
    )
    .unwrap();

    /// Session cookies cleared because the backend rejected the token.
    pub static ref SESSIONS_EVICTED_TOTAL: IntCounter = IntCounter::new(
        "codestrain_sessions_evicted_total",
        "Session cookies evicted after backend rejection",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    pub static ref BACKEND_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "codestrain_backend_request_duration_seconds",
            "Backend API call duration in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Later calls are no-ops.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(BACKEND_REQUESTS_TOTAL.clone()),
            Box::new(ACTION_FAILURES_TOTAL.clone()),
            Box::new(SESSIONS_EVICTED_TOTAL.clone()),
            Box::new(BACKEND_REQUEST_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            REGISTRY.register(c).expect("failed to register metric");
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
