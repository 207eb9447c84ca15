//! # Queue and Store Flows
//!
//! Delivery properties of the in-process queue and store, exercised
//! through the public `shared-bus` API on a multi-threaded runtime.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    use shared_bus::{
        handler_fn, select_store, HandlerError, InMemoryMessageQueueStore, MessagePublisher,
        MessageQueueStore,
    };
    use shared_types::BrokeredMessage;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn numbered(channel: &str, producer: u64, seq: u64) -> BrokeredMessage {
        BrokeredMessage::new(channel, serde_json::json!({ "producer": producer, "seq": seq }))
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<serde_json::Value>, n: usize) -> Vec<serde_json::Value> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let next = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for deliveries")
                .expect("subscriber dropped");
            out.push(next);
        }
        out
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_producer_fifo() {
        let store = InMemoryMessageQueueStore::new();
        let queue = store.get_message_queue("fifo");

        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.subscribe(Arc::new(handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.message.content);
                Ok::<(), HandlerError>(())
            }
        })));

        for seq in 0..500 {
            queue.publish(numbered("fifo", 0, seq)).await.unwrap();
        }

        let seqs: Vec<u64> = collect(&mut rx, 500)
            .await
            .iter()
            .map(|v| v["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, (0..500).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_per_producer_order_with_concurrent_producers() {
        let store = InMemoryMessageQueueStore::new();
        let queue = store.get_message_queue("many");

        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.subscribe(Arc::new(handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.message.content);
                Ok::<(), HandlerError>(())
            }
        })));

        let producers = 8u64;
        let per_producer = 100u64;
        let mut tasks = Vec::new();
        for producer in 0..producers {
            let queue = Arc::clone(&queue);
            tasks.push(tokio::spawn(async move {
                for seq in 0..per_producer {
                    queue.publish(numbered("many", producer, seq)).await.unwrap();
                }
            }));
        }
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        let delivered = collect(&mut rx, (producers * per_producer) as usize).await;
        let mut last_seen: HashMap<u64, u64> = HashMap::new();
        for value in delivered {
            let producer = value["producer"].as_u64().unwrap();
            let seq = value["seq"].as_u64().unwrap();
            if let Some(prev) = last_seen.insert(producer, seq) {
                assert!(seq > prev, "producer {producer} delivered {seq} after {prev}");
            }
        }
        assert_eq!(last_seen.len(), producers as usize);
        assert!(last_seen.values().all(|&seq| seq == per_producer - 1));
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failing_subscriber_does_not_block_others() {
        let store = InMemoryMessageQueueStore::new();
        let queue = store.get_message_queue("isolated");

        queue.subscribe(Arc::new(handler_fn(|_event| async move {
            Err::<(), _>(HandlerError::failed("always"))
        })));
        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.subscribe(Arc::new(handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.message.content);
                Ok::<(), HandlerError>(())
            }
        })));

        for seq in 0..10 {
            queue.publish(numbered("isolated", 0, seq)).await.unwrap();
        }
        assert_eq!(collect(&mut rx, 10).await.len(), 10);

        timeout(Duration::from_secs(5), async {
            while queue.handler_failures() < 10 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("failures not counted");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_accepted() {
        let store = InMemoryMessageQueueStore::new();
        let queue = store.get_message_queue("void");
        let publisher: Arc<dyn MessagePublisher> = queue.clone();

        for seq in 0..5 {
            publisher.publish(numbered("void", 0, seq)).await.unwrap();
        }
        assert_eq!(queue.messages_published(), 5);

        timeout(Duration::from_secs(5), async {
            while queue.messages_delivered() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages not drained");
        assert_eq!(queue.pending(), 0);
    }

    // =============================================================================
    // STORE
    // =============================================================================

    #[test]
    fn test_concurrent_get_message_queue_returns_one_instance() {
        let store: Arc<dyn MessageQueueStore> =
            select_store(vec![Arc::new(InMemoryMessageQueueStore::new())]);
        let threads = 32;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.get_message_queue("contended")
                })
            })
            .collect();

        let queues: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(queues.iter().all(|q| Arc::ptr_eq(q, &queues[0])));
        assert_eq!(store.channels(), vec!["contended".to_string()]);
    }

    #[test]
    fn test_distinct_channels_are_distinct_queues() {
        let store = InMemoryMessageQueueStore::new();
        let a = store.get_message_queue("a");
        let b = store.get_message_queue("b");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 2);
    }
}
