//! # Command-Queue Benchmarks
//!
//! | Group | What |
//! |-------|------|
//! | envelope | request encode/decode with the JSON codec |
//! | round-trip | one Ping call through an in-memory queue and a live processor |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use cq_tests::fixtures::{demo_builder, Harness};
use shared_types::{CorrelationId, JsonCodec, RequestEnvelope};

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let codec = JsonCodec;

    for items in [1usize, 16, 256] {
        let payload = json!({
            "item_id": 3,
            "lines": (0..items).map(|i| json!({ "sku": format!("sku-{i}"), "qty": i })).collect::<Vec<_>>(),
        });
        let request = RequestEnvelope::new(CorrelationId::new(), "Ping", "memory://reply", payload);
        let (body, attrs) = request.encode(&codec).unwrap();

        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", items), &request, |b, request| {
            b.iter(|| black_box(request.encode(&codec).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", items), &body, |b, body| {
            b.iter(|| black_box(RequestEnvelope::decode(body, &attrs, &codec).unwrap()))
        });
    }
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let (harness, client) = runtime.block_on(async {
        let harness = Harness::start_with(demo_builder().poll_wait(Duration::from_millis(50))).await;
        let client = harness.client().await;
        (harness, client)
    });

    let mut group = c.benchmark_group("round-trip");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("ping", |b| {
        b.iter(|| {
            runtime.block_on(async {
                black_box(client.call("Ping", json!({ "item_id": 1 })).await.unwrap())
            })
        })
    });
    group.finish();

    runtime.block_on(async {
        client.close().await.unwrap();
        harness.shutdown().await;
    });
}

criterion_group!(benches, bench_envelope, bench_round_trip);
criterion_main!(benches);
