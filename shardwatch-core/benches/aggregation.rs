use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shardwatch_core::{aggregate_snapshot, resolve_shard, summarize, IncidentBook};
use shardwatch_types::{Impact, IncidentDetails, TelemetrySnapshot, Timestamp};

/// Build a fleet of `clusters` clusters with `per_cluster` shards each,
/// roughly one in twenty down.
fn fleet_snapshot(clusters: u32, per_cluster: u32) -> TelemetrySnapshot {
    let mut builder = TelemetrySnapshot::builder().max_concurrency(16);
    for c in 0..clusters {
        builder = builder.cluster(c, |mut cluster| {
            for i in 0..per_cluster {
                let shard_id = c * per_cluster + i;
                cluster = cluster.shard(shard_id, |s| {
                    let s = s.latency(20 + shard_id % 80);
                    if shard_id % 20 == 7 {
                        s
                    } else {
                        s.connected()
                    }
                });
            }
            cluster
        });
    }
    builder.build()
}

/// Benchmark the full rollup with varying fleet sizes
fn bench_aggregate_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_snapshot");

    for clusters in [1u32, 10, 50, 200].iter() {
        let snapshot = fleet_snapshot(*clusters, 16);
        group.bench_with_input(BenchmarkId::from_parameter(clusters), clusters, |b, _| {
            b.iter(|| {
                black_box(aggregate_snapshot(black_box(&snapshot)));
            });
        });
    }
    group.finish();
}

/// Benchmark the status line over a realistic incident load
fn bench_summarize(c: &mut Criterion) {
    let fleet = aggregate_snapshot(&fleet_snapshot(50, 16));
    let book = IncidentBook::new();
    for n in 0..100u64 {
        let id = book
            .open(
                IncidentDetails::new(format!("incident {n}"), Impact::Minor),
                "Investigating",
                Timestamp::from_secs(n),
            )
            .unwrap()
            .id;
        if n % 10 != 0 {
            book.resolve(&id, "Resolved", Timestamp::from_secs(n + 1))
                .unwrap();
        }
    }
    let incidents = book.all();
    let now = Timestamp::from_secs(1_000);

    c.bench_function("summarize_100_incidents", |b| {
        b.iter(|| {
            black_box(summarize(black_box(&fleet), &incidents, now));
        });
    });
}

/// Benchmark shard resolution for ids inside and beyond u64
fn bench_resolve_shard(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_shard");
    for id in ["175928847299117063", "1267650600228229401496703205376"] {
        group.bench_with_input(BenchmarkId::from_parameter(id.len()), id, |b, id| {
            b.iter(|| {
                black_box(resolve_shard(black_box(id), 1024).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_aggregate_snapshot,
    bench_summarize,
    bench_resolve_shard
);
criterion_main!(benches);
