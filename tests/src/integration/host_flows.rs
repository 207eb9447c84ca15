//! # Broker Host Flows
//!
//! A broker runtime hosting pipe-backed queues, fed by `RemotePublisher`s
//! as another process would.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use broker_runtime::{BrokerRuntime, HostConfig, RemotePublisher, StoreKind};
    use pipe_transport::TransportConfig;
    use shared_bus::{handler_fn, HandlerError, MessagePublisher};
    use shared_types::BrokeredMessage;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn host_config(dir: &TempDir, channels: &[&str]) -> HostConfig {
        HostConfig {
            channels: channels.iter().map(|c| c.to_string()).collect(),
            store: StoreKind::NamedPipe,
            transport: TransportConfig::with_pipe_dir(dir.path()),
            metrics_interval: Duration::from_millis(20),
            ..HostConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_remote_publish_reaches_hosted_queue() {
        let dir = TempDir::new().unwrap();
        let config = host_config(&dir, &["orders"]);
        let transport = config.transport.clone();
        let runtime = BrokerRuntime::new(config).unwrap();
        runtime.start();

        let (tx, mut rx) = mpsc::unbounded_channel();
        runtime.queue("orders").subscribe(Arc::new(handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.message);
                Ok::<(), HandlerError>(())
            }
        })));

        let publisher = RemotePublisher::new("orders", transport);
        let mut sent = Vec::new();
        for n in 0..10 {
            let message = BrokeredMessage::new("orders", serde_json::json!({ "n": n }))
                .with_header("source", "host-flow");
            sent.push(message.id);
            publisher.publish(message).await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..10 {
            let message = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for delivery")
                .expect("subscriber dropped");
            assert_eq!(message.header("source"), Some("host-flow"));
            received.push(message.id);
        }
        // Each publish is its own connection; arrival order across
        // connections is not guaranteed.
        received.sort();
        sent.sort();
        assert_eq!(received, sent);

        let pipe_store = runtime.pipe_store().unwrap();
        timeout(Duration::from_secs(5), async {
            while pipe_store.server_stats("orders").map(|s| s.messages_received) != Some(10) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("server stats did not settle");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_created_on_demand() {
        let dir = TempDir::new().unwrap();
        let config = host_config(&dir, &["first"]);
        let transport = config.transport.clone();
        let runtime = BrokerRuntime::new(config).unwrap();
        runtime.start();

        let queue = runtime.queue("late");
        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.subscribe(Arc::new(handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.channel);
                Ok::<(), HandlerError>(())
            }
        })));

        RemotePublisher::new("late", transport)
            .publish(BrokeredMessage::new("late", serde_json::json!(true)))
            .await
            .unwrap();

        let channel = timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(channel, "late");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_fails() {
        let dir = TempDir::new().unwrap();
        let config = TransportConfig {
            connect_attempts: 2,
            connect_retry_delay: Duration::from_millis(1),
            ..TransportConfig::with_pipe_dir(dir.path())
        };
        let host = HostConfig {
            transport: config.clone(),
            ..host_config(&dir, &["closing"])
        };
        let runtime = BrokerRuntime::new(host).unwrap();
        runtime.start();

        let publisher = RemotePublisher::new("closing", config);
        publisher
            .publish(BrokeredMessage::new("closing", serde_json::json!(1)))
            .await
            .unwrap();

        runtime.shutdown().await;

        assert!(publisher
            .publish(BrokeredMessage::new("closing", serde_json::json!(2)))
            .await
            .is_err());
    }
}
