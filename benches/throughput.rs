//! Throughput benchmarks for the MilletDB storage engine.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use milletdb::snapshot::codec;
use milletdb::storage::ShardedStore;
use std::sync::Arc;

fn bench_insert(c: &mut Criterion) {
    let store = Arc::new(ShardedStore::new(16, 100_000, None, None));

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.insert(key, Bytes::from("small_value")).unwrap();
            i += 1;
        });
    });

    group.bench_function("insert_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024));
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.insert(key, value.clone()).unwrap();
            i += 1;
        });
    });

    group.bench_function("insert_overwrite", |b| {
        let key = Bytes::from("hot-key");
        let value = Bytes::from("v");
        b.iter(|| {
            store.insert(key.clone(), value.clone()).unwrap();
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let store = Arc::new(ShardedStore::new(16, 200_000, None, None));
    for i in 0..100_000 {
        store
            .insert(
                Bytes::from(format!("key:{}", i)),
                Bytes::from(format!("value:{}", i)),
            )
            .unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_miss", |b| {
        let key = Bytes::from("absent-key");
        b.iter(|| {
            black_box(store.get(&key));
        });
    });

    group.finish();
}

fn bench_eviction_pressure(c: &mut Criterion) {
    // Capacity small enough that nearly every insert evicts.
    let store = Arc::new(ShardedStore::new(4, 1024, None, None));

    let mut group = c.benchmark_group("eviction");
    group.throughput(Throughput::Elements(1));
    group.bench_function("insert_at_capacity", |b| {
        let mut i = 0u64;
        let value = Bytes::from("v");
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.insert(key, value.clone()).unwrap();
            i += 1;
        });
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let store = Arc::new(ShardedStore::new(8, 10_000, None, None));
    for i in 0..50_000 {
        store
            .insert(
                Bytes::from(format!("key:{}", i)),
                Bytes::from(format!("value:{}", i)),
            )
            .unwrap();
    }

    let mut group = c.benchmark_group("snapshot");
    group.bench_function("capture", |b| {
        b.iter(|| black_box(store.capture_snapshot()));
    });

    let image = store.capture_snapshot();
    group.bench_function("encode", |b| {
        b.iter(|| black_box(codec::encode(&image)));
    });

    let encoded = codec::encode(&image);
    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec::decode(&encoded).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_get,
    bench_eviction_pressure,
    bench_snapshot
);
criterion_main!(benches);
