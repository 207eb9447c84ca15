//! # Pipe Transport
//!
//! Carries single UTF-8 messages between processes over OS named pipes.
//!
//! ## Connection Model
//!
//! One message per connection. A server keeps a listen loop alive for its
//! channel; every accepted connection is handed to its own task, so the next
//! client can connect while the previous message is still being read.
//!
//! ```text
//!  PipeClient ──connect──→ [endpoint] ──accept──→ PipeServer loop
//!      │                                               │ spawn
//!      └──── frame(len ‖ utf8) ──────────────────→ connection task
//!                                                      │
//!                                           MessageHandler::on_message
//! ```
//!
//! ## Pipe Identity
//!
//! - **Windows:** `\\.\pipe\<channel>`, message endpoints created per connection.
//! - **Unix:** `<pipe_dir>/<channel>.sock` Unix domain socket.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
mod endpoint;
pub mod error;
pub mod framing;
pub mod handler;
pub mod server;


pub use client::{send_message, PipeClient};
pub use config::TransportConfig;
pub use endpoint::pipe_name;
pub use error::{MessageHandlerError, TransportError};
pub use handler::{handler_fn, FnMessageHandler, MessageHandler};
pub use server::{PipeServer, ServerStats};

/// Re-exported so callers can build the token the transport expects.
pub use tokio_util::sync::CancellationToken;

/// Size of the big-endian length prefix in front of every message.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default chunk size for reading a message body.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default upper bound on a single message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Reject channel names that cannot be used verbatim as a pipe identifier.
pub fn validate_channel(channel: &str) -> Result<(), TransportError> {
    if channel.is_empty() {
        return Err(TransportError::InvalidChannel {
            channel: channel.to_string(),
            reason: "empty name",
        });
    }
    if channel.contains(['/', '\\', '\0']) {
        return Err(TransportError::InvalidChannel {
            channel: channel.to_string(),
            reason: "contains a path separator or NUL",
        });
    }
    Ok(())
}
