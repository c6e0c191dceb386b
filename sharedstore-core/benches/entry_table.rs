use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use serde_json::json;
use sharedstore_core::protocol::Envelope;
use sharedstore_core::store::EntryTable;
use sharedstore_core::test_utils::TestCluster;
use std::time::Duration;

fn filled_table(size: usize) -> EntryTable {
    let mut table = EntryTable::new();
    for i in 0..size {
        table.set(&format!("key-{}", i), json!({ "n": i, "tags": ["a", "b"] }));
    }
    table
}

fn bench_table_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_table");

    for size in [10usize, 100, 1000] {
        let table = filled_table(size);
        let target = format!("key-{}", size / 2);

        group.bench_with_input(BenchmarkId::new("get", size), &size, |b, _| {
            b.iter(|| black_box(table.get(black_box(&target))));
        });

        group.bench_with_input(BenchmarkId::new("overwrite", size), &size, |b, _| {
            let mut table = table.clone();
            b.iter(|| table.set(black_box(&target), json!(1)));
        });

        group.bench_with_input(BenchmarkId::new("remove_then_append", size), &size, |b, _| {
            // Each removal vacates a slot, so every batch starts from an unmodified table
            b.iter_batched(
                || table.clone(),
                |mut table| {
                    table.remove(black_box(&target));
                    table.set(&target, json!(2));
                    table
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_snapshot_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_encoding");

    for size in [10usize, 100, 1000] {
        let snapshot = filled_table(size).snapshot();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("update_storage", size), &size, |b, _| {
            b.iter(|| {
                let envelope = Envelope::update_storage(black_box(&snapshot)).unwrap();
                black_box(envelope.to_value().unwrap())
            });
        });

        let encoded = Envelope::update_storage(&snapshot)
            .unwrap()
            .to_value()
            .unwrap();
        group.bench_with_input(BenchmarkId::new("apply", size), &size, |b, _| {
            b.iter(|| {
                let envelope = Envelope::from_value(black_box(encoded.clone())).unwrap();
                EntryTable::from_snapshot(envelope.snapshot_arg(0).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_replicated_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("replicated_write");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for workers in [1usize, 4, 16] {
        let cluster = runtime.block_on(TestCluster::start(workers));

        group.bench_with_input(BenchmarkId::new("owner_set", workers), &workers, |b, _| {
            b.to_async(&runtime)
                .iter(|| async { cluster.owner.set_item("bench", json!(1)).await.unwrap() });
        });

        group.bench_with_input(BenchmarkId::new("worker_set", workers), &workers, |b, _| {
            b.to_async(&runtime)
                .iter(|| async { cluster.worker(0).set_item("bench", json!(2)).await.unwrap() });
        });

        runtime.block_on(cluster.shutdown());
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_table_operations,
    bench_snapshot_encoding,
    bench_replicated_write
);
criterion_main!(benches);
