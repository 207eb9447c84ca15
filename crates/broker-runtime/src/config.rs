//! # Host Configuration
//!
//! Unified configuration for the broker host.
//!
//! All values have defaults; every section can be overridden from the
//! environment.

use std::env;
use std::time::Duration;

use broker_telemetry::TelemetryConfig;
use pipe_transport::{validate_channel, TransportConfig, TransportError};
use shared_bus::BusConfig;
use thiserror::Error;

/// Which queue store the host should run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Queues reachable only from inside this process.
    InProcess,
    /// Queues also reachable from other processes over named pipes.
    NamedPipe,
}

impl StoreKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "memory" | "in-process" | "inprocess" => Some(Self::InProcess),
            "pipe" | "named-pipe" | "namedpipe" => Some(Self::NamedPipe),
            _ => None,
        }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Channels opened at startup.
    pub channels: Vec<String>,
    /// Store variant.
    pub store: StoreKind,
    /// Queue configuration.
    pub bus: BusConfig,
    /// Pipe transport configuration.
    pub transport: TransportConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
    /// How often queue gauges are sampled.
    pub metrics_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            channels: vec!["default".to_string()],
            store: StoreKind::NamedPipe,
            bus: BusConfig::default(),
            transport: TransportConfig::default(),
            telemetry: TelemetryConfig::default(),
            metrics_interval: Duration::from_secs(15),
        }
    }
}

impl HostConfig {
    /// Create configuration from environment variables.
    ///
    /// - `BROKER_CHANNELS`: comma separated channel names (default: `default`)
    /// - `BROKER_STORE`: `pipe` or `memory` (default: `pipe`)
    /// - `BROKER_METRICS_INTERVAL_SECS`: gauge sampling period (default: 15)
    ///
    /// Bus, transport and telemetry sections read their own variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let channels = env::var("BROKER_CHANNELS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.channels);

        Self {
            channels,
            store: env::var("BROKER_STORE")
                .ok()
                .and_then(|v| StoreKind::parse(&v))
                .unwrap_or(defaults.store),
            bus: BusConfig::from_env(),
            transport: TransportConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            metrics_interval: env::var("BROKER_METRICS_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.metrics_interval),
        }
    }

    /// Validate configuration before the host starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for channel in &self.channels {
            validate_channel(channel).map_err(ConfigError::InvalidChannel)?;
        }
        self.transport.validate().map_err(ConfigError::Transport)?;
        if self.metrics_interval.is_zero() {
            return Err(ConfigError::ZeroMetricsInterval);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No channel configured.
    #[error("No channels configured. Set BROKER_CHANNELS to a comma separated list.")]
    NoChannels,

    /// A configured channel cannot be used as a pipe name.
    #[error("Invalid channel: {0}")]
    InvalidChannel(#[source] TransportError),

    /// Transport section is unusable.
    #[error("Invalid transport settings: {0}")]
    Transport(#[source] TransportError),

    /// Metrics sampling interval is zero.
    #[error("metrics_interval must be greater than zero")]
    ZeroMetricsInterval,
}
