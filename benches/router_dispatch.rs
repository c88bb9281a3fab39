//! Router dispatch benchmark suite.
//!
//! Measures a full request through the router at different concurrency levels:
//! - Concurrent calls: 1, 16, 256
//!
//! Run with: cargo bench --bench router_dispatch
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures_util::future::join_all;
use plugin_rpc::{HandlerTable, Message, MessageRouter, SurfaceType};
use serde_json::json;
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONCURRENCY: &[usize] = &[1, 16, 256];

// ============================================================================
// Setup
// ============================================================================

fn router() -> Arc<MessageRouter> {
    let table = HandlerTable::new();
    table.on_content_script("cs1", "ext1", |content| async move { Ok(content) });
    table.on_view("ext1", "web-1", |content| async move { Ok(content) });

    let router = MessageRouter::builder()
        .engine(table)
        .build()
        .expect("router");
    router.register_responder(SurfaceType::NoteTextViewer, "note-1", |_| {});
    router.register_responder(SurfaceType::UserWebview, "web-1", |_| {});
    Arc::new(router)
}

// ============================================================================
// Benchmark: Request Round Trip
// ============================================================================

fn bench_request(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = router();

    let mut group = c.benchmark_group("request");

    for &count in CONCURRENCY {
        group.bench_with_input(BenchmarkId::new("content_script", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| {
                let router = Arc::clone(&router);
                async move {
                    let calls = (0..n).map(|i| {
                        router.request(Message::content_script_request(
                            "cs1",
                            "note-1",
                            json!({ "i": i }),
                        ))
                    });
                    join_all(calls).await
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("webview", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| {
                let router = Arc::clone(&router);
                async move {
                    let calls = (0..n).map(|i| {
                        router.request(Message::webview_request("ext1", "web-1", json!({ "i": i })))
                    });
                    join_all(calls).await
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Push
// ============================================================================

fn bench_push(c: &mut Criterion) {
    let router = router();
    router.register_callback(SurfaceType::UserWebview, "web-1", |_| {});

    c.bench_function("push", |b| {
        b.iter(|| router.push(Message::plugin_push("ext1", "web-1", json!({ "tick": 1 }))))
    });
}

criterion_group!(benches, bench_request, bench_push);
criterion_main!(benches);
