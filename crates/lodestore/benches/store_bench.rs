//! Benchmarks for the store's hot paths.
//!
//! Run with: `cargo bench -p lodestore`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use futures_util::future::join_all;
use lodestore::{CacheStore, StoreConfig, fetch_fn};
use tokio::runtime::Runtime;

fn build_store() -> CacheStore<String> {
    CacheStore::new(
        StoreConfig::new("bench"),
        fetch_fn(|key: String| async move { Ok::<_, anyhow::Error>(format!("value:{key}")) }),
    )
    .unwrap()
}

fn bench_hit_path(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = build_store();
    rt.block_on(async {
        store.get("hot").await.unwrap();
    });

    c.bench_function("get_ready_hit", |b| {
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move { black_box(store.get("hot").await.unwrap()) }
        })
    });
}

fn bench_concurrent_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = build_store();
    rt.block_on(async {
        store.get("hot").await.unwrap();
    });

    c.bench_function("get_ready_hit_x16", |b| {
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move {
                let results = join_all((0..16).map(|_| store.get("hot"))).await;
                black_box(results)
            }
        })
    });
}

fn bench_set(c: &mut Criterion) {
    let store = build_store();

    c.bench_function("set_overwrite", |b| {
        b.iter(|| {
            black_box(store.set("hot", "value".to_string()));
        })
    });
}

criterion_group!(benches, bench_hit_path, bench_concurrent_hits, bench_set);
criterion_main!(benches);
