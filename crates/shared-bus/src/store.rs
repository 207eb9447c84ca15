//! # Message Queue Store
//!
//! Maps channel names to queue instances, one queue per name.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::BusConfig;
use crate::queue::MessageQueue;
use crate::IN_PROCESS_STORE_PRIORITY;

/// Registry of message queues keyed by channel name.
///
/// Implementations must guarantee get-or-create atomicity: concurrent
/// callers asking for the same channel receive the same `Arc`.
pub trait MessageQueueStore: Send + Sync {
    /// Return the queue for `channel`, creating it if absent.
    fn get_message_queue(&self, channel: &str) -> Arc<MessageQueue>;

    /// Channels that currently have a queue.
    fn channels(&self) -> Vec<String>;

    /// Selection priority; higher wins in [`select_store`].
    fn priority(&self) -> i32 {
        IN_PROCESS_STORE_PRIORITY
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Default in-process store.
pub struct InMemoryMessageQueueStore {
    queues: DashMap<String, Arc<MessageQueue>>,
    config: BusConfig,
}

impl InMemoryMessageQueueStore {
    /// Create a store with default bus configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a store whose queues use `config`.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            queues: DashMap::new(),
            config,
        }
    }

    /// Get or create the queue for `channel`, reporting whether this call
    /// created it. Exactly one caller observes `true` per channel.
    pub fn get_or_create(&self, channel: &str) -> (Arc<MessageQueue>, bool) {
        if let Some(existing) = self.queues.get(channel) {
            return (Arc::clone(existing.value()), false);
        }

        let mut created = false;
        let queue = self
            .queues
            .entry(channel.to_string())
            .or_insert_with(|| {
                created = true;
                debug!(channel = channel, "Message queue created");
                Arc::new(MessageQueue::new(channel, &self.config))
            })
            .value()
            .clone();
        (queue, created)
    }

    /// Number of queues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Whether no queue has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Configuration applied to new queues.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Default for InMemoryMessageQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueueStore for InMemoryMessageQueueStore {
    fn get_message_queue(&self, channel: &str) -> Arc<MessageQueue> {
        self.get_or_create(channel).0
    }

    fn channels(&self) -> Vec<String> {
        self.queues.iter().map(|entry| entry.key().clone()).collect()
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

/// Pick the highest-priority store. Ties keep the earlier candidate; an
/// empty candidate list yields the in-process store.
pub fn select_store(candidates: Vec<Arc<dyn MessageQueueStore>>) -> Arc<dyn MessageQueueStore> {
    let selected = candidates
        .into_iter()
        .fold(None::<Arc<dyn MessageQueueStore>>, |best, candidate| match best {
            Some(best) if best.priority() >= candidate.priority() => Some(best),
            _ => Some(candidate),
        })
        .unwrap_or_else(|| Arc::new(InMemoryMessageQueueStore::new()));

    debug!(
        store = selected.name(),
        priority = selected.priority(),
        "Message queue store selected"
    );
    selected
}
