//! Bus configuration from environment variables.

use std::env;

use crate::DEFAULT_DEPTH_WARNING_THRESHOLD;

/// Configuration shared by all queues created by a store.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Pending-message count above which publishes log a warning.
    /// Buffering itself is unbounded; `0` disables the warning.
    pub depth_warning_threshold: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            depth_warning_threshold: DEFAULT_DEPTH_WARNING_THRESHOLD,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// - `BROKER_QUEUE_DEPTH_WARNING`: depth warning threshold (default: 10000)
    pub fn from_env() -> Self {
        Self {
            depth_warning_threshold: env::var("BROKER_QUEUE_DEPTH_WARNING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DEPTH_WARNING_THRESHOLD),
        }
    }
}
