//! Prometheus metrics for the broker.
//!
//! All metrics follow the naming convention: `broker_<area>_<metric>_<unit>`
//! and carry a `channel` label.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // QUEUE METRICS
    // =========================================================================

    /// Messages accepted by queue publish
    pub static ref MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_queue_messages_published_total", "Messages published to a queue"),
        &["channel"]
    ).expect("metric creation failed");

    /// Messages delivered to subscribers
    pub static ref MESSAGES_DELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_queue_messages_delivered_total", "Messages dequeued and offered to subscribers"),
        &["channel"]
    ).expect("metric creation failed");

    /// Subscriber invocations that failed
    pub static ref HANDLER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_queue_handler_failures_total", "Subscriber errors and panics"),
        &["channel"]
    ).expect("metric creation failed");

    /// Pending messages per queue, sampled
    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("broker_queue_depth", "Messages waiting for delivery"),
        &["channel"]
    ).expect("metric creation failed");

    // =========================================================================
    // PIPE TRANSPORT METRICS
    // =========================================================================

    /// Messages received over the pipe transport
    pub static ref PIPE_MESSAGES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_pipe_messages_received_total", "Messages read from a pipe channel"),
        &["channel"]
    ).expect("metric creation failed");

    /// Pipe messages that could not be decoded or forwarded
    pub static ref PIPE_MESSAGE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_pipe_message_errors_total", "Pipe messages dropped after a decode or forward error"),
        &["channel"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(MESSAGES_DELIVERED.clone()),
        Box::new(HANDLER_FAILURES.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(PIPE_MESSAGES_RECEIVED.clone()),
        Box::new(PIPE_MESSAGE_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
