//! # Broker Runtime
//!
//! Owns the selected queue store, attaches the host subscribers to every
//! configured channel and samples queue counters into Prometheus.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Build candidate stores and select the highest-priority one
//! 3. Open a queue per configured channel and attach subscribers
//! 4. Start the metrics sampler

use std::collections::HashMap;
use std::sync::Arc;

use broker_telemetry::{HANDLER_FAILURES, MESSAGES_DELIVERED, MESSAGES_PUBLISHED, QUEUE_DEPTH};
use parking_lot::Mutex;
use shared_bus::{select_store, InMemoryMessageQueueStore, MessageQueue, MessageQueueStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::adapters::PipeMessageQueueStore;
use crate::config::{ConfigError, HostConfig, StoreKind};
use crate::handlers::LoggingSubscriber;

/// The broker host: one store, many channels.
pub struct BrokerRuntime {
    config: HostConfig,
    store: Arc<dyn MessageQueueStore>,
    pipe_store: Option<Arc<PipeMessageQueueStore>>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BrokerRuntime {
    /// Create a runtime. No queue is opened until [`start`](Self::start).
    pub fn new(config: HostConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let memory: Arc<dyn MessageQueueStore> =
            Arc::new(InMemoryMessageQueueStore::with_config(config.bus.clone()));
        let mut candidates = vec![memory];

        let pipe_store = match config.store {
            StoreKind::NamedPipe => {
                let store = Arc::new(PipeMessageQueueStore::new(
                    config.bus.clone(),
                    config.transport.clone(),
                ));
                candidates.push(Arc::clone(&store) as Arc<dyn MessageQueueStore>);
                Some(store)
            }
            StoreKind::InProcess => None,
        };

        let store = select_store(candidates);
        info!(store = store.name(), priority = store.priority(), "Queue store selected");

        Ok(Self {
            config,
            store,
            pipe_store,
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Open every configured channel and start background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        info!("===========================================");
        info!("  Pipe Broker Host v{}", env!("CARGO_PKG_VERSION"));
        info!("  Store: {}", self.store.name());
        info!("===========================================");

        for channel in &self.config.channels {
            let queue = self.store.get_message_queue(channel);
            queue.subscribe(Arc::new(LoggingSubscriber));
            info!(channel = %channel, "Channel open");
        }

        if let Some(pipe_store) = &self.pipe_store {
            let deferred = pipe_store.open_pending();
            if deferred > 0 {
                debug!(servers = deferred, "Started deferred pipe servers");
            }
        }

        let sampler = tokio::spawn(sample_queues(
            Arc::clone(&self.store),
            self.config.metrics_interval,
            self.token.child_token(),
        ));
        self.tasks.lock().push(sampler);
    }

    /// Queue for `channel` from the selected store.
    pub fn queue(&self, channel: &str) -> Arc<MessageQueue> {
        self.store.get_message_queue(channel)
    }

    /// The selected store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn MessageQueueStore> {
        Arc::clone(&self.store)
    }

    /// The pipe-backed store, when the host exposes queues over pipes.
    #[must_use]
    pub fn pipe_store(&self) -> Option<&Arc<PipeMessageQueueStore>> {
        self.pipe_store.as_ref()
    }

    /// Token cancelled on shutdown.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop background tasks and pipe servers.
    pub async fn shutdown(&self) {
        info!("Shutting down broker runtime");
        self.token.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task failed");
            }
        }

        if let Some(pipe_store) = &self.pipe_store {
            pipe_store.shutdown().await;
        }
        info!("Broker runtime stopped");
    }
}

/// Last observed queue counters per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct QueueCounters {
    published: u64,
    delivered: u64,
    failures: u64,
}

type Observed = HashMap<String, QueueCounters>;

async fn sample_queues(
    store: Arc<dyn MessageQueueStore>,
    period: std::time::Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    let mut observed = Observed::new();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => record_queue_metrics(store.as_ref(), &mut observed),
        }
    }
    debug!("Queue sampler stopped");
}

fn record_queue_metrics(store: &dyn MessageQueueStore, observed: &mut Observed) {
    for channel in store.channels() {
        let queue = store.get_message_queue(&channel);
        let current = QueueCounters {
            published: queue.messages_published(),
            delivered: queue.messages_delivered(),
            failures: queue.handler_failures(),
        };
        let last = observed.get(&channel).copied().unwrap_or_default();

        let labels = [channel.as_str()];
        QUEUE_DEPTH
            .with_label_values(&labels)
            .set(i64::try_from(queue.pending()).unwrap_or(i64::MAX));
        MESSAGES_PUBLISHED
            .with_label_values(&labels)
            .inc_by(current.published.saturating_sub(last.published));
        MESSAGES_DELIVERED
            .with_label_values(&labels)
            .inc_by(current.delivered.saturating_sub(last.delivered));
        HANDLER_FAILURES
            .with_label_values(&labels)
            .inc_by(current.failures.saturating_sub(last.failures));

        observed.insert(channel, current);
    }
}
