//! Benchmarks for the festival cache.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use festival_cache::{CacheConfig, KeyedCache, SetOptions, UnavailableStore};
use std::sync::Arc;

/// A cache that never writes snapshots, so benchmarks measure the
/// in-memory path only.
fn memory_only(config: CacheConfig) -> KeyedCache<String> {
    KeyedCache::with_store(config, Arc::new(UnavailableStore))
}

/// Benchmark single-threaded get/set operations.
fn bench_single_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded");

    let cache = memory_only(CacheConfig::new().max_size_bytes(0).build());

    for i in 0..10_000 {
        cache
            .set(format!("/festival/{}", i), format!("page {}", i))
            .unwrap();
    }

    group.bench_function("get_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("/festival/{}", i % 10_000);
            black_box(cache.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("/missing/{}", i);
            black_box(cache.get(&key));
            i += 1;
        });
    });

    group.bench_function("set_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("/festival/{}", i % 10_000);
            cache.set(key, "updated page".to_string()).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent operations.
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for num_threads in [2, 4, 8].iter() {
        let cache = memory_only(CacheConfig::new().max_size_bytes(0).build());

        for i in 0..10_000 {
            cache
                .set(format!("/festival/{}", i), format!("page {}", i))
                .unwrap();
        }

        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::new("mixed_ops", num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let cache = cache.clone();
                            std::thread::spawn(move || {
                                for i in 0..1000 {
                                    let key = format!("/festival/{}", (t * 1000 + i) % 10_000);
                                    if i % 5 == 0 {
                                        cache.set(key, "page".to_string()).unwrap();
                                    } else {
                                        black_box(cache.get(&key));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark eviction under byte pressure.
fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    let cache = memory_only(CacheConfig::new().max_size_bytes(16 * 1024).build());

    for i in 0..1000 {
        cache.set(format!("/festival/{}", i), "page".to_string()).unwrap();
    }

    group.bench_function("set_with_eviction", |b| {
        let mut i = 1000;
        b.iter(|| {
            cache.set(format!("/festival/{}", i), "page".to_string()).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark tag invalidation over a populated cache.
fn bench_invalidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate");

    for size in [1_000usize, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("by_tag", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let cache = memory_only(CacheConfig::new().max_size_bytes(0).build());
                    for i in 0..size {
                        let tag = if i % 10 == 0 { "blog" } else { "festivals" };
                        let options = SetOptions::new().tag(tag);
                        cache
                            .set_with(format!("/page/{}", i), "page".to_string(), options)
                            .unwrap();
                    }
                    cache
                },
                |cache| black_box(cache.invalidate_by_tag("blog")),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_threaded,
    bench_concurrent,
    bench_eviction,
    bench_invalidate,
);
criterion_main!(benches);
