//! # Error Types
//!
//! Errors raised while encoding or decoding brokered messages.

use thiserror::Error;

/// Errors related to the `BrokeredMessage` wire format.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Envelope version not supported by this build.
    #[error("Unsupported envelope version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    /// Payload was not a valid JSON envelope.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}
