//! Dispatch benchmark suite.
//!
//! Benchmarks the connection hot paths over an in-memory transport:
//! - Queue flush on open: 10, 100, 1000 queued payloads
//! - Message fan-out: 1, 8, 64 listeners
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tokio::sync::Notify;
use url::Url;
use ws_reconnect::{
    Connection, ConnectionConfig, Connector, Frame, JsonSerializer, TransportEvents,
    TransportHandle,
};

// ============================================================================
// In-Memory Transport
// ============================================================================

/// Transport that opens as soon as it is created.
#[derive(Clone, Default)]
struct InstantConnector {
    sent: Arc<AtomicUsize>,
    flushed: Arc<Notify>,
    target: Arc<AtomicUsize>,
    events: Arc<Mutex<Option<TransportEvents>>>,
}

struct CountingHandle {
    sent: Arc<AtomicUsize>,
    flushed: Arc<Notify>,
    target: Arc<AtomicUsize>,
}

impl TransportHandle for CountingHandle {
    fn send(&self, _frame: Frame) -> ws_reconnect::Result<()> {
        let sent = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        if sent == self.target.load(Ordering::Relaxed) {
            self.flushed.notify_one();
        }
        Ok(())
    }

    fn close(&self) {}
}

impl Connector for InstantConnector {
    fn connect(
        &self,
        _url: &Url,
        _protocols: &[String],
        events: TransportEvents,
    ) -> Box<dyn TransportHandle> {
        events.open();
        *self.events.lock() = Some(events);
        Box::new(CountingHandle {
            sent: Arc::clone(&self.sent),
            flushed: Arc::clone(&self.flushed),
            target: Arc::clone(&self.target),
        })
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::builder("ws://127.0.0.1:9")
        .build()
        .expect("valid config")
}

// ============================================================================
// Benchmark Parameters
// ============================================================================

const QUEUE_SIZES: &[usize] = &[10, 100, 1000];
const LISTENER_COUNTS: &[usize] = &[1, 8, 64];
const MESSAGES_PER_ITER: usize = 100;

// ============================================================================
// Benchmark: Queue Flush
// ============================================================================

fn bench_queue_flush(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("queue_flush");

    for &size in QUEUE_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("flush", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let connector = InstantConnector::default();
                connector.target.store(size, Ordering::Relaxed);
                let connection = Connection::with_connector(
                    JsonSerializer::<Value>::new(),
                    config(),
                    connector.clone(),
                )
                .expect("connection");

                for n in 0..size {
                    connection.send(json!({ "seq": n }));
                }
                connection.connect();
                connector.flushed.notified().await;
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Message Fan-Out
// ============================================================================

fn bench_message_fanout(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("message_fanout");
    group.throughput(Throughput::Elements(MESSAGES_PER_ITER as u64));

    for &listeners in LISTENER_COUNTS {
        let (connection, connector, done, received) = rt.block_on(async {
            let connector = InstantConnector::default();
            let connection = Connection::with_connector(
                JsonSerializer::<Value>::new(),
                config(),
                connector.clone(),
            )
            .expect("connection");

            let done = Arc::new(Notify::new());
            let received = Arc::new(AtomicUsize::new(0));
            let expected = listeners * MESSAGES_PER_ITER;
            for _ in 0..listeners {
                let done = Arc::clone(&done);
                let received = Arc::clone(&received);
                connection.on_message(move |_| {
                    if received.fetch_add(1, Ordering::Relaxed) + 1 == expected {
                        done.notify_one();
                    }
                });
            }

            connection.connect();
            (connection, connector, done, received)
        });

        let events = connector
            .events
            .lock()
            .clone()
            .expect("transport created");
        let frame = Frame::from(json!({ "type": "tick", "payload": [1, 2, 3] }).to_string());

        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, _| {
                b.to_async(&rt).iter(|| {
                    let events = events.clone();
                    let frame = frame.clone();
                    let done = Arc::clone(&done);
                    let received = Arc::clone(&received);
                    async move {
                        received.store(0, Ordering::Relaxed);
                        for _ in 0..MESSAGES_PER_ITER {
                            events.message(frame.clone());
                        }
                        done.notified().await;
                    }
                });
            },
        );

        drop(connection);
    }

    group.finish();
}

criterion_group!(benches, bench_queue_flush, bench_message_fanout);
criterion_main!(benches);
