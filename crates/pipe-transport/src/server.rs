//! # Pipe Server
//!
//! Listen loop for one channel.
//!
//! ## Iteration
//!
//! 1. Make sure an endpoint for the channel exists (bind on demand).
//! 2. Wait for a client, racing the cancellation token.
//! 3. Hand the connection to its own task before reading anything, so the
//!    next client can connect immediately.
//! 4. The connection task reads one framed message, decodes UTF-8 and
//!    invokes the handler.
//!
//! Bind, accept, read and handler failures are logged and contained to the
//! iteration they happen in. Only cancellation ends the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::endpoint::{PipeListener, ServerStream};
use crate::error::TransportError;
use crate::framing::read_frame;
use crate::handler::MessageHandler;
use crate::validate_channel;

/// Counters for one server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections accepted.
    pub connections_accepted: u64,
    /// Messages read and handed to the handler successfully.
    pub messages_received: u64,
    /// Bind or accept failures.
    pub connection_errors: u64,
    /// Read, decode or handler failures.
    pub message_errors: u64,
}

#[derive(Default)]
struct StatsCounters {
    connections_accepted: AtomicU64,
    messages_received: AtomicU64,
    connection_errors: AtomicU64,
    message_errors: AtomicU64,
}

struct ServerInner {
    channel: String,
    config: TransportConfig,
    handler: Arc<dyn MessageHandler>,
    stats: StatsCounters,
}

/// Server side of a named-pipe channel.
#[derive(Clone)]
pub struct PipeServer {
    inner: Arc<ServerInner>,
}

impl PipeServer {
    /// Create a server for `channel`. Nothing is bound until [`open`](Self::open).
    pub fn new(
        channel: impl Into<String>,
        config: TransportConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, TransportError> {
        let channel = channel.into();
        validate_channel(&channel)?;
        config.validate()?;

        Ok(Self {
            inner: Arc::new(ServerInner {
                channel,
                config,
                handler,
                stats: StatsCounters::default(),
            }),
        })
    }

    /// Channel served by this server.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Start the listen loop and return immediately.
    ///
    /// The loop runs until `token` is cancelled. Must be called from
    /// within a Tokio runtime.
    pub fn open(&self, token: CancellationToken) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.listen(token).await })
    }

    /// Snapshot of the server counters.
    #[must_use]
    pub fn stats(&self) -> ServerStats {
        let s = &self.inner.stats;
        ServerStats {
            connections_accepted: s.connections_accepted.load(Ordering::Relaxed),
            messages_received: s.messages_received.load(Ordering::Relaxed),
            connection_errors: s.connection_errors.load(Ordering::Relaxed),
            message_errors: s.message_errors.load(Ordering::Relaxed),
        }
    }
}

impl ServerInner {
    async fn listen(self: Arc<Self>, token: CancellationToken) {
        tokio::task::yield_now().await;
        info!(channel = %self.channel, "Pipe server listening");

        let mut listener: Option<PipeListener> = None;

        loop {
            if token.is_cancelled() {
                warn!(channel = %self.channel, "Pipe server cancelled");
                break;
            }

            if listener.is_none() {
                match PipeListener::bind(&self.channel, &self.config) {
                    Ok(bound) => listener = Some(bound),
                    Err(e) => {
                        self.stats.connection_errors.fetch_add(1, Ordering::Relaxed);
                        error!(channel = %self.channel, error = %e, "Failed to create pipe endpoint");
                        if !self.backoff(&token).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(active) = listener.as_mut() else {
                continue;
            };

            let accepted = tokio::select! {
                _ = token.cancelled() => {
                    warn!(channel = %self.channel, "Pipe server cancelled while waiting for a connection");
                    break;
                }
                accepted = active.accept() => accepted,
            };

            match accepted {
                Ok(stream) => {
                    self.stats
                        .connections_accepted
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(channel = %self.channel, "Pipe client connected");
                    tokio::spawn(Arc::clone(&self).serve_connection(stream, token.clone()));
                }
                Err(e) => {
                    self.stats.connection_errors.fetch_add(1, Ordering::Relaxed);
                    error!(channel = %self.channel, error = %e, "Failed to accept pipe connection");
                    if !self.backoff(&token).await {
                        break;
                    }
                }
            }
        }

        drop(listener);
        info!(channel = %self.channel, "Pipe server stopped");
    }

    /// Pause after an endpoint failure. Returns false if cancelled meanwhile.
    async fn backoff(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.config.accept_error_backoff) => true,
        }
    }

    async fn serve_connection(self: Arc<Self>, mut stream: ServerStream, token: CancellationToken) {
        let outcome = async {
            let bytes = read_frame(
                &mut stream,
                self.config.read_chunk_size,
                self.config.max_message_bytes,
                &token,
            )
            .await?;
            // Closing here lets the client return as soon as the frame is in.
            drop(stream);

            let message = String::from_utf8(bytes)?;
            self.handler
                .on_message(&self.channel, message, token.clone())
                .await?;
            Ok::<(), TransportError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
            }
            Err(TransportError::Cancelled) => {
                debug!(channel = %self.channel, "Pipe read cancelled");
            }
            Err(TransportError::NoFrame) => {
                // Endpoint liveness checks connect and hang up immediately.
                debug!(channel = %self.channel, "Pipe client disconnected without sending");
            }
            Err(e) => {
                self.stats.message_errors.fetch_add(1, Ordering::Relaxed);
                error!(channel = %self.channel, error = %e, "Failed to process pipe message");
            }
        }
    }
}
