//! # Queue Subscribers
//!
//! Subscribers the host attaches to every configured channel. Delivery
//! counts are sampled from the queues by the runtime, so they also cover
//! channels without subscribers.

use async_trait::async_trait;
use shared_bus::{ArrivalHandler, HandlerError, MessageArrived};
use tracing::info;

/// Logs every delivered message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSubscriber;

#[async_trait]
impl ArrivalHandler for LoggingSubscriber {
    async fn on_arrived(&self, sender: &str, event: &MessageArrived) -> Result<(), HandlerError> {
        info!(
            channel = sender,
            id = %event.message.id,
            headers = event.message.headers.len(),
            content = %event.message.content,
            "Message arrived"
        );
        Ok(())
    }
}
