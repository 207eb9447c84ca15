//! Message-received callback invoked by the pipe server.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::MessageHandlerError;

/// Receives every complete message read by a [`PipeServer`](crate::PipeServer).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one decoded message from `channel`.
    ///
    /// `token` is the server's cancellation token; long-running handlers
    /// should stop when it fires.
    async fn on_message(
        &self,
        channel: &str,
        message: String,
        token: CancellationToken,
    ) -> Result<(), MessageHandlerError>;
}

/// Adapter turning an async closure into a [`MessageHandler`].
pub struct FnMessageHandler<F> {
    f: F,
}

/// Wrap an async closure `(channel, message, token)` as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnMessageHandler<F>
where
    F: Fn(String, String, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessageHandlerError>> + Send + 'static,
{
    FnMessageHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnMessageHandler<F>
where
    F: Fn(String, String, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessageHandlerError>> + Send + 'static,
{
    async fn on_message(
        &self,
        channel: &str,
        message: String,
        token: CancellationToken,
    ) -> Result<(), MessageHandlerError> {
        (self.f)(channel.to_string(), message, token).await
    }
}
