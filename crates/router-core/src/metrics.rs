//! # Router Metrics
//!
//! Recording side of the router's Prometheus collectors. The collectors live
//! in `router-telemetry`; without the `metrics` feature every function here
//! is a no-op.
//!
//! ## Metrics
//!
//! - `router_navigations_total{outcome}`: navigations by outcome
//! - `router_endpoint_transitions_total`: endpoint transitions that completed
//! - `router_guard_rejections_total{guard}`: guard rejections by guard
//! - `router_active_endpoints`: endpoints connected to the scope tree
//! - `router_navigation_duration_seconds`: navigation duration

use router_bus::NavigationOutcome;

fn outcome_label(outcome: NavigationOutcome) -> &'static str {
    match outcome {
        NavigationOutcome::Committed => "committed",
        NavigationOutcome::Cancelled => "cancelled",
        NavigationOutcome::Failed => "failed",
    }
}

#[cfg(feature = "metrics")]
pub fn record_navigation(outcome: NavigationOutcome) {
    router_telemetry::NAVIGATIONS
        .with_label_values(&[outcome_label(outcome)])
        .inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_navigation(outcome: NavigationOutcome) {
    let _ = outcome_label(outcome);
}

#[cfg(feature = "metrics")]
pub fn record_transition() {
    router_telemetry::ENDPOINT_TRANSITIONS.inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_transition() {}

/// `guard` is one of `can_load`, `can_unload`, `before_navigation`.
#[cfg(feature = "metrics")]
pub fn record_guard_rejection(guard: &str) {
    router_telemetry::GUARD_REJECTIONS
        .with_label_values(&[guard])
        .inc();
}

#[cfg(not(feature = "metrics"))]
pub fn record_guard_rejection(_guard: &str) {}

#[cfg(feature = "metrics")]
pub fn set_active_endpoints(count: usize) {
    router_telemetry::ACTIVE_ENDPOINTS.set(count as f64);
}

#[cfg(not(feature = "metrics"))]
pub fn set_active_endpoints(_count: usize) {}

/// Observes the navigation duration when dropped.
pub struct NavigationTimer {
    #[cfg(feature = "metrics")]
    _timer: router_telemetry::HistogramTimer,
}

impl NavigationTimer {
    pub fn start() -> Self {
        Self {
            #[cfg(feature = "metrics")]
            _timer: router_telemetry::HistogramTimer::new(&router_telemetry::NAVIGATION_DURATION),
        }
    }
}
