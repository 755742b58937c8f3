//! Criterion micro-benchmarks for heap field access, snapshots and
//! hashing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use keel_bench::{ballast_heap, Ballast};
use keel_heap::{compare_snapshots, snapshot_hash, HeapConfig, SimHeap};

/// Benchmark: bump a scalar on 10K objects.
fn bench_scalar_update_10k(c: &mut Criterion) {
    let (mut heap, objects) = ballast_heap(10_000).unwrap();

    c.bench_function("scalar_update_10k", |b| {
        b.iter(|| {
            for obj in &objects {
                obj.counter.update(&mut heap, |n| n.wrapping_add(1)).unwrap();
            }
        });
    });
}

/// Benchmark: read every array element of 10K objects.
fn bench_array_read_10k(c: &mut Criterion) {
    let (heap, objects) = ballast_heap(10_000).unwrap();

    c.bench_function("array_read_10k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for obj in &objects {
                for i in 0..obj.hold.len() {
                    sum += u64::from(obj.hold.get(&heap, i).unwrap());
                }
            }
            black_box(sum);
        });
    });
}

/// Benchmark: construct and destroy 1K objects.
fn bench_construct_destroy_1k(c: &mut Criterion) {
    c.bench_function("construct_destroy_1k", |b| {
        b.iter_batched(
            || SimHeap::new(HeapConfig::default()).unwrap(),
            |mut heap| {
                let objects: Vec<Ballast> =
                    (0..1000).map(|i| heap.construct(i).unwrap()).collect();
                for obj in objects {
                    heap.destroy(obj).unwrap();
                }
                black_box(heap.len());
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: serialize 10K objects.
fn bench_serialize_10k(c: &mut Criterion) {
    let (heap, _) = ballast_heap(10_000).unwrap();

    c.bench_function("serialize_10k", |b| {
        b.iter(|| black_box(heap.serialize()));
    });
}

/// Benchmark: restore 10K objects in place.
fn bench_deserialize_10k(c: &mut Criterion) {
    let (mut heap, _) = ballast_heap(10_000).unwrap();
    let bytes = heap.serialize();

    c.bench_function("deserialize_10k", |b| {
        b.iter(|| heap.deserialize(black_box(&bytes)).unwrap());
    });
}

/// Benchmark: hash 10K objects.
fn bench_snapshot_hash_10k(c: &mut Criterion) {
    let (heap, _) = ballast_heap(10_000).unwrap();

    c.bench_function("snapshot_hash_10k", |b| {
        b.iter(|| black_box(snapshot_hash(&heap)));
    });
}

/// Benchmark: diff two 10K-object snapshots that differ in one field.
fn bench_compare_10k(c: &mut Criterion) {
    let (mut heap, objects) = ballast_heap(10_000).unwrap();
    let expected = heap.serialize();
    objects[5_000].counter.set(&mut heap, 1).unwrap();
    let actual = heap.serialize();

    c.bench_function("compare_snapshots_10k", |b| {
        b.iter(|| black_box(compare_snapshots(&expected, &actual).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_scalar_update_10k,
    bench_array_read_10k,
    bench_construct_destroy_1k,
    bench_serialize_10k,
    bench_deserialize_10k,
    bench_snapshot_hash_10k,
    bench_compare_10k
);
criterion_main!(benches);
