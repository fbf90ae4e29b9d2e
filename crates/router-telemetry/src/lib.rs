//! # Router Telemetry
//!
//! Logging and metrics setup for the viewport router.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use router_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `viewport-router` | Service name on log lines |
//! | `VR_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `VR_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `VR_JSON_LOGS` | `false` | JSON formatted logs |
//! | `VR_METRICS` | `true` | Register the Prometheus collectors |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ACTIVE_ENDPOINTS,
    ENDPOINT_TRANSITIONS, GUARD_REJECTIONS, NAVIGATIONS, NAVIGATION_DURATION,
};
pub use tracing_setup::{build_filter, init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and (optionally) metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing = init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down router telemetry");
    }
}
