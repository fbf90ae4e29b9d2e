//! Subscriber setup for structured router logs.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and either a
//! human readable or a JSON `fmt` layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Marker returned once the global subscriber is installed.
#[derive(Debug)]
pub struct TracingGuard {
    service_name: String,
}

impl TracingGuard {
    /// Service name the subscriber was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Install the global subscriber.
///
/// Fails with [`TelemetryError::TracingInit`] when a subscriber is already set,
/// so calling it twice is harmless for callers that ignore the error.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = build_filter(config)?;

    if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        if config.console_output {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init()
                .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .try_init()
                .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
        }
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        if config.console_output {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .try_init()
                .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
        }
    }

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        "Router logging initialized"
    );

    Ok(TracingGuard {
        service_name: config.service_name.clone(),
    })
}
