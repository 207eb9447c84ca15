//! Transport errors.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Errors that can occur in pipe transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying pipe I/O failed.
    #[error("Pipe I/O error: {0}")]
    Io(#[from] io::Error),

    /// Channel name cannot be used as a pipe identifier.
    #[error("Invalid channel name {channel:?}: {reason}")]
    InvalidChannel {
        channel: String,
        reason: &'static str,
    },

    /// Message exceeds the configured maximum.
    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// Peer closed the connection without sending any frame bytes.
    #[error("Connection closed before a frame was sent")]
    NoFrame,

    /// Peer closed the connection before a full frame arrived.
    #[error("Connection closed after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    /// Message body is not valid UTF-8.
    #[error("Message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Operation interrupted by the cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// No server endpoint accepted the connection.
    #[error("Failed to connect to channel {channel} after {attempts} attempt(s): {source}")]
    ConnectFailed {
        channel: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The registered message handler reported a failure.
    #[error("Message handler failed: {0}")]
    Handler(#[from] MessageHandlerError),

    /// Transport configuration is unusable.
    #[error("Invalid transport configuration: {0}")]
    Config(String),
}

/// Errors returned by a [`MessageHandler`](crate::MessageHandler).
#[derive(Debug, Error)]
pub enum MessageHandlerError {
    /// The handler rejected or failed to process the message.
    #[error("{0}")]
    Failed(String),

    /// Any other error raised by handler code.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl MessageHandlerError {
    /// Convenience constructor for a plain failure message.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
