//! # Named-Pipe Queue Store
//!
//! A [`MessageQueueStore`] whose queues can also be published to from other
//! processes. Every queue it creates gets a pipe server on the same channel
//! name; each message read from the pipe is decoded as a
//! [`BrokeredMessage`] and published into the queue.
//!
//! ```text
//! other process ──pipe──→ PipeServer(channel) ──QueueBridge──→ MessageQueue ──→ subscribers
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use broker_telemetry::{PIPE_MESSAGES_RECEIVED, PIPE_MESSAGE_ERRORS};
use dashmap::DashMap;
use parking_lot::Mutex;
use pipe_transport::{
    CancellationToken, MessageHandler, MessageHandlerError, PipeServer, ServerStats,
    TransportConfig,
};
use shared_bus::{BusConfig, InMemoryMessageQueueStore, MessageQueue, MessageQueueStore};
use shared_types::BrokeredMessage;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::NAMED_PIPE_STORE_PRIORITY;

/// Forwards decoded pipe messages into one queue.
struct QueueBridge {
    queue: Arc<MessageQueue>,
}

#[async_trait]
impl MessageHandler for QueueBridge {
    async fn on_message(
        &self,
        channel: &str,
        message: String,
        _token: CancellationToken,
    ) -> Result<(), MessageHandlerError> {
        let decoded = match BrokeredMessage::from_json(&message) {
            Ok(decoded) => decoded,
            Err(e) => {
                PIPE_MESSAGE_ERRORS.with_label_values(&[channel]).inc();
                return Err(MessageHandlerError::Other(Box::new(e)));
            }
        };

        if decoded.channel != channel {
            debug!(
                channel = channel,
                addressed_to = %decoded.channel,
                "Pipe message addressed to another channel, delivering to this queue"
            );
        }

        if let Err(e) = self.queue.publish(decoded).await {
            PIPE_MESSAGE_ERRORS.with_label_values(&[channel]).inc();
            return Err(MessageHandlerError::Other(Box::new(e)));
        }

        PIPE_MESSAGES_RECEIVED.with_label_values(&[channel]).inc();
        Ok(())
    }
}

/// Queue store that exposes every queue over the named-pipe transport.
pub struct PipeMessageQueueStore {
    queues: InMemoryMessageQueueStore,
    transport: TransportConfig,
    servers: DashMap<String, PipeServer>,
    /// Channels whose server could not be started for lack of a runtime.
    unopened: Mutex<Vec<String>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl PipeMessageQueueStore {
    /// Create a store using `bus` for its queues and `transport` for its
    /// pipe servers.
    #[must_use]
    pub fn new(bus: BusConfig, transport: TransportConfig) -> Self {
        Self {
            queues: InMemoryMessageQueueStore::with_config(bus),
            transport,
            servers: DashMap::new(),
            unopened: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Transport settings used by this store's servers.
    #[must_use]
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Counters of the pipe server for `channel`, if one exists.
    #[must_use]
    pub fn server_stats(&self, channel: &str) -> Option<ServerStats> {
        self.servers.get(channel).map(|server| server.stats())
    }

    /// Start servers for queues created while no runtime was available.
    ///
    /// Returns the number of servers started.
    pub fn open_pending(&self) -> usize {
        let Ok(handle) = Handle::try_current() else {
            return 0;
        };

        let pending: Vec<String> = std::mem::take(&mut *self.unopened.lock());
        let mut started = 0;
        for channel in pending {
            if let Some(server) = self.servers.get(&channel) {
                self.spawn_server(&handle, server.value());
                started += 1;
            }
        }
        started
    }

    /// Stop every pipe server and wait for their listen loops to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Pipe server task failed");
            }
        }
        info!(servers = self.servers.len(), "Pipe store shut down");
    }

    fn attach_server(&self, channel: &str, queue: Arc<MessageQueue>) {
        let bridge = Arc::new(QueueBridge { queue });
        let server = match PipeServer::new(channel, self.transport.clone(), bridge) {
            Ok(server) => server,
            Err(e) => {
                error!(
                    channel = channel,
                    error = %e,
                    "Cannot expose queue over pipe, it stays in-process only"
                );
                return;
            }
        };

        // Registered before it can be listed as unopened, so open_pending
        // always finds it.
        self.servers.insert(channel.to_string(), server.clone());

        match Handle::try_current() {
            Ok(handle) => self.spawn_server(&handle, &server),
            Err(_) => {
                warn!(
                    channel = channel,
                    "No async runtime, pipe server deferred until open_pending"
                );
                self.unopened.lock().push(channel.to_string());
            }
        }
    }

    fn spawn_server(&self, handle: &Handle, server: &PipeServer) {
        let _guard = handle.enter();
        let task = server.open(self.shutdown.child_token());
        self.handles.lock().push(task);
    }
}

impl MessageQueueStore for PipeMessageQueueStore {
    fn get_message_queue(&self, channel: &str) -> Arc<MessageQueue> {
        let (queue, created) = self.queues.get_or_create(channel);
        if created {
            self.attach_server(channel, Arc::clone(&queue));
        }
        queue
    }

    fn channels(&self) -> Vec<String> {
        self.queues.channels()
    }

    fn priority(&self) -> i32 {
        NAMED_PIPE_STORE_PRIORITY
    }

    fn name(&self) -> &'static str {
        "named-pipe"
    }
}

impl Drop for PipeMessageQueueStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
