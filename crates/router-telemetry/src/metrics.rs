//! Prometheus metrics for the viewport router.
//!
//! All metrics follow the naming convention: `router_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: navigations by outcome, endpoint transitions, guard rejections
//! - **Gauge**: endpoints currently connected
//! - **Histogram**: navigation duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Router metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Navigations by outcome (committed, cancelled, failed)
    pub static ref NAVIGATIONS: CounterVec = CounterVec::new(
        Opts::new("router_navigations_total", "Navigations processed by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Endpoint transitions that reached `completed`
    pub static ref ENDPOINT_TRANSITIONS: Counter = Counter::new(
        "router_endpoint_transitions_total",
        "Endpoint transitions driven to completion"
    ).expect("metric creation failed");

    /// Guard rejections by guard (can_load, can_unload, before_navigation)
    pub static ref GUARD_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("router_guard_rejections_total", "Guard rejections by guard"),
        &["guard"]
    ).expect("metric creation failed");

    /// Endpoints currently connected to the scope tree
    pub static ref ACTIVE_ENDPOINTS: Gauge = Gauge::new(
        "router_active_endpoints",
        "Endpoints currently connected to the routing scope tree"
    ).expect("metric creation failed");

    /// Navigation duration histogram
    pub static ref NAVIGATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "router_navigation_duration_seconds",
            "Time from navigation start to its end notification"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Handle proving the router collectors are registered.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all router metrics with [`REGISTRY`].
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(NAVIGATIONS.clone()),
        Box::new(ENDPOINT_TRANSITIONS.clone()),
        Box::new(GUARD_REJECTIONS.clone()),
        Box::new(ACTIVE_ENDPOINTS.clone()),
        Box::new(NAVIGATION_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all router metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
