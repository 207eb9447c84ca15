//! # Arrival Events
//!
//! The "message arrived" notification raised by a queue for every message
//! it delivers, and the subscriber side of that contract.

use std::future::Future;

use async_trait::async_trait;
use shared_types::BrokeredMessage;
use thiserror::Error;

/// Errors a subscriber may report back to the queue.
///
/// The queue only logs these; they never reach the publisher.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The subscriber rejected or failed to process the message.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// Any other error raised by subscriber code.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Convenience constructor for a plain failure message.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Event args passed to subscribers when a message is dequeued.
#[derive(Debug, Clone)]
pub struct MessageArrived {
    /// Channel of the queue that delivered the message.
    pub channel: String,
    /// The delivered message.
    pub message: BrokeredMessage,
}

/// Subscriber of a queue's arrived event.
#[async_trait]
pub trait ArrivalHandler: Send + Sync {
    /// Handle one delivered message.
    ///
    /// `sender` is the channel name of the queue raising the event.
    async fn on_arrived(&self, sender: &str, event: &MessageArrived) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into an [`ArrivalHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a subscriber.
///
/// The closure receives an owned copy of the event args.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(MessageArrived) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> ArrivalHandler for FnHandler<F>
where
    F: Fn(MessageArrived) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_arrived(&self, _sender: &str, event: &MessageArrived) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}
