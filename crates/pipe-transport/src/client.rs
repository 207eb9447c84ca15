//! # Pipe Client
//!
//! Connects to a channel and sends exactly one message per connection.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::config::TransportConfig;
use crate::endpoint::{self, ClientStream};
use crate::error::TransportError;
use crate::framing::write_frame;
use crate::validate_channel;

/// A connected client for one message exchange.
pub struct PipeClient {
    channel: String,
    stream: ClientStream,
    max_message_bytes: usize,
}

impl PipeClient {
    /// Connect to the server endpoint for `channel`.
    ///
    /// Retries while the endpoint does not exist yet or all instances are
    /// busy, up to `config.connect_attempts`.
    pub async fn connect(channel: &str, config: &TransportConfig) -> Result<Self, TransportError> {
        validate_channel(channel)?;
        config.validate()?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match endpoint::connect(channel, config).await {
                Ok(stream) => {
                    debug!(channel = channel, attempt = attempt, "Connected to pipe");
                    return Ok(Self {
                        channel: channel.to_string(),
                        stream,
                        max_message_bytes: config.max_message_bytes,
                    });
                }
                Err(e) if endpoint::is_retryable(&e) && attempt < config.connect_attempts => {
                    debug!(channel = channel, attempt = attempt, error = %e, "Pipe not ready, retrying");
                    tokio::time::sleep(config.connect_retry_delay).await;
                }
                Err(e) => {
                    return Err(TransportError::ConnectFailed {
                        channel: channel.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Channel this client is connected to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Send one message and close the connection.
    ///
    /// Returns once the server has read the whole frame and hung up.
    pub async fn send(mut self, message: &str) -> Result<(), TransportError> {
        write_frame(&mut self.stream, message.as_bytes(), self.max_message_bytes).await?;
        self.stream.shutdown().await?;

        // Server closes its end after reading the frame.
        let mut sink = [0u8; 64];
        loop {
            match self.stream.read(&mut sink).await {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if is_hangup(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }

        debug!(channel = %self.channel, bytes = message.len(), "Pipe message sent");
        Ok(())
    }
}

fn is_hangup(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof
    )
}

/// Connect to `channel`, send `message`, disconnect.
pub async fn send_message(
    channel: &str,
    message: &str,
    config: &TransportConfig,
) -> Result<(), TransportError> {
    PipeClient::connect(channel, config).await?.send(message).await
}
