//! # Pipe Broker Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | Queue publish | Enqueue cost, subscribers attached |
//! | Queue drain | Publish-to-delivery for a batch |
//! | Pipe send | One connection, one framed message (Unix only) |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_bus::{handler_fn, HandlerError, InMemoryMessageQueueStore, MessageQueueStore};
use shared_types::BrokeredMessage;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime")
}

// ============================================================================
// QUEUE
// ============================================================================

fn bench_queue_publish(c: &mut Criterion) {
    let rt = runtime();
    let store = InMemoryMessageQueueStore::new();
    let queue = store.get_message_queue("bench-publish");
    queue.subscribe(Arc::new(handler_fn(|_event| async move {
        Ok::<(), HandlerError>(())
    })));

    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));
    group.bench_function("publish_single", |b| {
        b.to_async(&rt).iter(|| {
            let queue = Arc::clone(&queue);
            async move {
                let message = BrokeredMessage::new("bench-publish", serde_json::json!(1));
                black_box(queue.publish(message).await.is_ok())
            }
        })
    });
    group.finish();
}

fn bench_queue_drain(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("queue-drain");
    group.measurement_time(Duration::from_secs(10));

    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("publish_and_deliver", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let store = InMemoryMessageQueueStore::new();
                let queue = store.get_message_queue("bench-drain");
                let seen = Arc::new(AtomicUsize::new(0));
                let counter = Arc::clone(&seen);
                queue.subscribe(Arc::new(handler_fn(move |_event| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::Relaxed);
                        Ok::<(), HandlerError>(())
                    }
                })));

                for i in 0..size {
                    let message = BrokeredMessage::new("bench-drain", serde_json::json!(i));
                    let _ = queue.publish(message).await;
                }
                while seen.load(Ordering::Relaxed) < size {
                    tokio::task::yield_now().await;
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// PIPE
// ============================================================================

#[cfg(unix)]
fn bench_pipe_send(c: &mut Criterion) {
    use pipe_transport::{
        handler_fn as pipe_handler_fn, send_message, CancellationToken, PipeServer,
        TransportConfig,
    };

    let rt = runtime();
    let dir = tempfile::TempDir::new().expect("tempdir");
    let config = TransportConfig::with_pipe_dir(dir.path());
    let token = CancellationToken::new();
    let handler = pipe_handler_fn(|_channel, _message, _token| async move {
        Ok::<(), pipe_transport::MessageHandlerError>(())
    });
    let server =
        PipeServer::new("bench-pipe", config.clone(), Arc::new(handler)).expect("server");
    let _listen = rt.block_on(async { server.open(token.clone()) });

    let mut group = c.benchmark_group("pipe");
    for size in [64usize, 4_096, 65_536] {
        let payload = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("send_message", size), &payload, |b, payload| {
            b.to_async(&rt)
                .iter(|| async { send_message("bench-pipe", payload, &config).await.is_ok() })
        });
    }
    group.finish();
    token.cancel();
}

#[cfg(not(unix))]
fn bench_pipe_send(_c: &mut Criterion) {}

criterion_group!(benches, bench_queue_publish, bench_queue_drain, bench_pipe_send);
criterion_main!(benches);
