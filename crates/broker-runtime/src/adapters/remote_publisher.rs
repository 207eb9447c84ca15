//! Publisher for queues hosted in another process.

use async_trait::async_trait;
use pipe_transport::{send_message, TransportConfig};
use shared_bus::{MessagePublisher, PublishError};
use shared_types::BrokeredMessage;
use tracing::debug;

/// Publishes messages to a channel served by a [`PipeMessageQueueStore`]
/// in some other process.
///
/// Each publish opens one pipe connection and returns once the server has
/// read the message.
///
/// [`PipeMessageQueueStore`]: crate::adapters::PipeMessageQueueStore
#[derive(Debug, Clone)]
pub struct RemotePublisher {
    channel: String,
    transport: TransportConfig,
}

impl RemotePublisher {
    /// Publisher targeting `channel`.
    pub fn new(channel: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            channel: channel.into(),
            transport,
        }
    }

    /// Target channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl MessagePublisher for RemotePublisher {
    async fn publish(&self, message: BrokeredMessage) -> Result<(), PublishError> {
        let payload = message.to_json()?;
        send_message(&self.channel, &payload, &self.transport)
            .await
            .map_err(|e| PublishError::Delivery(e.to_string()))?;
        debug!(channel = %self.channel, id = %message.id, "Published over pipe");
        Ok(())
    }
}
