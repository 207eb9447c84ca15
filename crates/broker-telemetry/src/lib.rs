//! # Broker Telemetry
//!
//! Structured logging and Prometheus counters for the broker host.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use broker_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BROKER_SERVICE_NAME` | `pipe-broker` | Service name in log records |
//! | `BROKER_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `BROKER_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `BROKER_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HANDLER_FAILURES, MESSAGES_DELIVERED, MESSAGES_PUBLISHED,
    PIPE_MESSAGES_RECEIVED, PIPE_MESSAGE_ERRORS, QUEUE_DEPTH,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
