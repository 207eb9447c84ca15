//! # Message Queue
//!
//! A single named FIFO with asynchronous delivery to subscribers.
//!
//! Publishing only enqueues and wakes the queue's dispatcher task; the
//! caller never waits for subscribers. The dispatcher drains the FIFO and
//! raises the arrived event for each message, one message at a time.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use shared_types::{BrokeredMessage, MessageError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::BusConfig;
use crate::events::{ArrivalHandler, MessageArrived};

/// Identifier returned by [`MessageQueue::subscribe`].
pub type SubscriptionId = u64;

/// Errors from publishing a message.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No async runtime was available to run the queue dispatcher.
    #[error("No async runtime available to deliver messages")]
    RuntimeUnavailable,

    /// The message could not be encoded for transport.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] MessageError),

    /// A remote endpoint could not be reached or rejected the message.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Trait for anything messages can be published to.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message. Returns once the message is accepted, not when
    /// it has been delivered.
    async fn publish(&self, message: BrokeredMessage) -> Result<(), PublishError>;
}

/// State shared between a queue handle and its dispatcher task.
struct QueueShared {
    channel: String,
    pending: Mutex<VecDeque<BrokeredMessage>>,
    wakeup: Notify,
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn ArrivalHandler>)>>,
    next_subscription: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
}

impl QueueShared {
    fn dequeue(&self) -> Option<BrokeredMessage> {
        self.pending.lock().pop_front()
    }

    /// Raise the arrived event for one message.
    async fn deliver(&self, message: BrokeredMessage) {
        let handlers: Vec<Arc<dyn ArrivalHandler>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        self.delivered.fetch_add(1, Ordering::Relaxed);

        if handlers.is_empty() {
            debug!(
                channel = %self.channel,
                message_id = %message.id,
                "No subscribers, message dropped"
            );
            return;
        }

        let event = MessageArrived {
            channel: self.channel.clone(),
            message,
        };

        for handler in handlers {
            let outcome = AssertUnwindSafe(handler.on_arrived(&self.channel, &event))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        channel = %self.channel,
                        message_id = %event.message.id,
                        content = %event.message.content,
                        error = %e,
                        "Subscriber failed to handle message"
                    );
                }
                Err(panic) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        channel = %self.channel,
                        message_id = %event.message.id,
                        content = %event.message.content,
                        panic = panic_message(panic.as_ref()),
                        "Subscriber panicked while handling message"
                    );
                }
            }
        }
    }
}

/// Named in-memory FIFO queue.
///
/// Created through a [`MessageQueueStore`](crate::MessageQueueStore); lives
/// as long as the store holds it. Dropping the last handle stops the
/// dispatcher; messages still pending at that point are discarded.
pub struct MessageQueue {
    shared: Arc<QueueShared>,
    dispatcher_started: AtomicBool,
    shutdown: CancellationToken,
    depth_warning_threshold: usize,
}

impl MessageQueue {
    /// Create a queue for `channel`. The dispatcher starts on first publish.
    #[must_use]
    pub fn new(channel: impl Into<String>, config: &BusConfig) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                channel: channel.into(),
                pending: Mutex::new(VecDeque::new()),
                wakeup: Notify::new(),
                handlers: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                handler_failures: AtomicU64::new(0),
            }),
            dispatcher_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            depth_warning_threshold: config.depth_warning_threshold,
        }
    }

    /// The queue's channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    /// Enqueue a message and schedule its delivery.
    ///
    /// Never waits on subscribers. Fails only when called outside an async
    /// runtime, in which case nothing is enqueued.
    pub async fn publish(&self, message: BrokeredMessage) -> Result<(), PublishError> {
        self.ensure_dispatcher()?;

        let depth = {
            let mut pending = self.shared.pending.lock();
            pending.push_back(message);
            pending.len()
        };
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        self.shared.wakeup.notify_one();

        if self.depth_warning_threshold > 0 && depth > self.depth_warning_threshold {
            warn!(
                channel = %self.shared.channel,
                depth = depth,
                threshold = self.depth_warning_threshold,
                "Queue depth above warning threshold"
            );
        }

        Ok(())
    }

    /// Register a subscriber for the arrived event.
    pub fn subscribe(&self, handler: Arc<dyn ArrivalHandler>) -> SubscriptionId {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.shared.handlers.write().push((id, handler));
        debug!(channel = %self.shared.channel, subscription = id, "Subscriber attached");
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.shared.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(channel = %self.shared.channel, subscription = id, "Subscriber detached");
        }
        removed
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.handlers.read().len()
    }

    /// Number of messages waiting for delivery.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Total messages accepted by `publish`.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Total messages dequeued and offered to subscribers.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Total subscriber invocations that returned an error or panicked.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.shared.handler_failures.load(Ordering::Relaxed)
    }

    fn ensure_dispatcher(&self) -> Result<(), PublishError> {
        if self.dispatcher_started.load(Ordering::Acquire) {
            return Ok(());
        }
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| PublishError::RuntimeUnavailable)?;
        if self
            .dispatcher_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            handle.spawn(run_dispatcher(
                Arc::clone(&self.shared),
                self.shutdown.clone(),
            ));
            debug!(channel = %self.shared.channel, "Queue dispatcher started");
        }
        Ok(())
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("channel", &self.shared.channel)
            .field("pending", &self.pending())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[async_trait]
impl MessagePublisher for MessageQueue {
    async fn publish(&self, message: BrokeredMessage) -> Result<(), PublishError> {
        MessageQueue::publish(self, message).await
    }
}

/// Delivery loop: one wake-up per publish, drain whatever is pending.
///
/// A wake-up that finds the FIFO already drained completes with no effect.
async fn run_dispatcher(shared: Arc<QueueShared>, shutdown: CancellationToken) {
    tokio::task::yield_now().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = shared.wakeup.notified() => {}
        }

        while !shutdown.is_cancelled() {
            let Some(message) = shared.dequeue() else {
                break;
            };
            shared.deliver(message).await;
        }
    }

    debug!(channel = %shared.channel, "Queue dispatcher stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
