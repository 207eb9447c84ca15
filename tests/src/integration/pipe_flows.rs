//! # Pipe Transport Flows
//!
//! Server and client over real OS endpoints in a temporary directory.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use pipe_transport::{
        handler_fn, send_message, CancellationToken, MessageHandlerError, MessageHandler, PipeServer,
        TransportConfig,
    };
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn recording_handler() -> (
        Arc<dyn MessageHandler>,
        mpsc::UnboundedReceiver<(String, String)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |channel, message, _token| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((channel, message));
                Ok::<(), MessageHandlerError>(())
            }
        });
        (Arc::new(handler), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
        timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for handler")
            .expect("handler dropped")
    }

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    /// One client, one message, then shutdown.
    #[tokio::test]
    async fn test_hello_world_on_test_chan() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig::with_pipe_dir(dir.path());
        let (handler, mut rx) = recording_handler();
        let token = CancellationToken::new();

        let server = PipeServer::new("test-chan", config.clone(), handler).unwrap();
        let listen = server.open(token.clone());

        send_message("test-chan", "hello world", &config).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            ("test-chan".to_string(), "hello world".to_string())
        );

        token.cancel();
        timeout(Duration::from_secs(5), listen)
            .await
            .expect("listen loop did not stop")
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    /// Cancelled before any client connects: the loop exits, no handler call.
    #[tokio::test]
    async fn test_cancel_before_connect() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig::with_pipe_dir(dir.path());
        let (handler, mut rx) = recording_handler();
        let token = CancellationToken::new();

        let server = PipeServer::new("never", config, handler).unwrap();
        let listen = server.open(token.clone());
        token.cancel();

        timeout(Duration::from_secs(5), listen)
            .await
            .expect("listen loop did not stop")
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(server.stats().messages_received, 0);
    }

    /// 100 clients one after another, each with a distinct payload.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_sequential_clients() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig::with_pipe_dir(dir.path());
        let (handler, mut rx) = recording_handler();
        let token = CancellationToken::new();

        let server = PipeServer::new("stress", config.clone(), handler).unwrap();
        let listen = server.open(token.clone());

        for i in 0..100 {
            send_message("stress", &format!("payload-{i}"), &config)
                .await
                .unwrap();
        }

        let mut seen = HashSet::new();
        for _ in 0..100 {
            let (channel, message) = next(&mut rx).await;
            assert_eq!(channel, "stress");
            seen.insert(message);
        }
        let expected: HashSet<String> = (0..100).map(|i| format!("payload-{i}")).collect();
        assert_eq!(seen, expected);

        // Nothing beyond the hundred sent messages is delivered.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(server.stats().messages_received, 100);

        token.cancel();
        listen.await.unwrap();
    }

    /// Clients connecting at the same time are all served.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clients() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig::with_pipe_dir(dir.path());
        let (handler, mut rx) = recording_handler();
        let token = CancellationToken::new();

        let server = PipeServer::new("burst", config.clone(), handler).unwrap();
        let listen = server.open(token.clone());

        let sends = (0..20).map(|i| {
            let config = config.clone();
            async move { send_message("burst", &format!("c{i}"), &config).await }
        });
        for result in futures::future::join_all(sends).await {
            result.unwrap();
        }

        let mut seen = HashSet::new();
        for _ in 0..20 {
            seen.insert(next(&mut rx).await.1);
        }
        assert_eq!(seen.len(), 20);

        token.cancel();
        listen.await.unwrap();
    }

    /// A message spanning many read chunks arrives intact.
    #[tokio::test]
    async fn test_multi_chunk_message() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig {
            read_chunk_size: 512,
            ..TransportConfig::with_pipe_dir(dir.path())
        };
        let (handler, mut rx) = recording_handler();
        let token = CancellationToken::new();

        let server = PipeServer::new("bulk", config.clone(), handler).unwrap();
        let listen = server.open(token.clone());

        let body: String = (0..20_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        send_message("bulk", &body, &config).await.unwrap();
        assert_eq!(next(&mut rx).await.1, body);

        send_message("bulk", "", &config).await.unwrap();
        assert_eq!(next(&mut rx).await.1, "");

        token.cancel();
        listen.await.unwrap();
    }

    /// Two channels in one directory do not see each other's traffic.
    #[tokio::test]
    async fn test_channels_are_isolated() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig::with_pipe_dir(dir.path());
        let token = CancellationToken::new();

        let (left_handler, mut left_rx) = recording_handler();
        let (right_handler, mut right_rx) = recording_handler();
        let left = PipeServer::new("left", config.clone(), left_handler).unwrap();
        let right = PipeServer::new("right", config.clone(), right_handler).unwrap();
        let tasks = [left.open(token.clone()), right.open(token.clone())];

        send_message("left", "L", &config).await.unwrap();
        send_message("right", "R", &config).await.unwrap();

        assert_eq!(next(&mut left_rx).await, ("left".into(), "L".into()));
        assert_eq!(next(&mut right_rx).await, ("right".into(), "R".into()));
        assert!(left_rx.try_recv().is_err());
        assert!(right_rx.try_recv().is_err());

        token.cancel();
        for task in tasks {
            task.await.unwrap();
        }
    }
}
