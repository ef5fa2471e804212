//! Cache benchmarks for freshline

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use freshline::{
    CacheEntry, CacheKey, CacheStrategy, Directives, InMemoryStore, KeyValueStorage,
    PrivateCacheStrategy, RequestCacheControl, VolatileStorage,
};
use std::hint::black_box;

fn request(uri: &str) -> http::Request<Bytes> {
    http::Request::get(uri)
        .header("accept", "application/json")
        .header("authorization", "Bearer token")
        .body(Bytes::new())
        .unwrap()
}

fn response(body_len: usize) -> http::Response<Bytes> {
    http::Response::builder()
        .header("cache-control", "public, max-age=300, stale-while-revalidate=60")
        .header("etag", "\"abc123\"")
        .header("vary", "accept")
        .body(Bytes::from(vec![b'x'; body_len]))
        .unwrap()
}

fn directive_parsing_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("directives");

    group.bench_function("parse_cache_control", |b| {
        b.iter(|| {
            let parsed = Directives::parse([
                "public, max-age=300, s-maxage=600",
                "stale-while-revalidate=60, stale-if-error=\"86400\", no-transform",
            ]);
            black_box(parsed.seconds("max-age"))
        });
    });

    group.bench_function("request_cache_control", |b| {
        let req = http::Request::get("https://example.com/")
            .header("cache-control", "max-stale=30, min-fresh=5")
            .body(())
            .unwrap();
        b.iter(|| black_box(RequestCacheControl::from_headers(req.headers())));
    });

    group.finish();
}

fn key_derivation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");
    group.throughput(Throughput::Elements(1));

    let plain = CacheKey::new("");
    let varied = CacheKey::new("").with_vary_headers(["authorization", "accept"]);
    let req = request("https://api.example.com/v1/users?page=2&sort=name");

    group.bench_function("derive", |b| b.iter(|| black_box(plain.derive(&req))));
    group.bench_function("derive_with_vary_headers", |b| {
        b.iter(|| black_box(varied.derive(&req)))
    });

    group.finish();
}

fn entry_serialization_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_json");

    for body_len in [256usize, 16 * 1024, 256 * 1024] {
        let entry = CacheEntry::new(
            &request("https://example.com/blob"),
            &response(body_len),
            chrono::Utc::now(),
        );
        let json = serde_json::to_string(&entry).unwrap();
        group.throughput(Throughput::Bytes(body_len as u64));

        group.bench_with_input(BenchmarkId::new("serialize", body_len), &entry, |b, entry| {
            b.iter(|| black_box(serde_json::to_string(entry).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("deserialize", body_len), &json, |b, json| {
            b.iter(|| black_box(serde_json::from_str::<CacheEntry>(json).unwrap()))
        });
    }

    group.finish();
}

fn strategy_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("private_strategy");
    group.throughput(Throughput::Elements(1));

    let volatile = PrivateCacheStrategy::new(VolatileStorage::new());
    let key_value = PrivateCacheStrategy::new(KeyValueStorage::new(InMemoryStore::new()));
    let req = request("https://example.com/item/1");
    let miss = request("https://example.com/item/2");
    let resp = response(4 * 1024);

    rt.block_on(async {
        volatile.cache(&req, &resp).await;
        key_value.cache(&req, &resp).await;
    });

    group.bench_function("volatile_cache", |b| {
        b.to_async(&rt).iter(|| async { black_box(volatile.cache(&req, &resp).await) });
    });
    group.bench_function("volatile_fetch_hit", |b| {
        b.to_async(&rt).iter(|| async { black_box(volatile.fetch(&req).await) });
    });
    group.bench_function("volatile_fetch_miss", |b| {
        b.to_async(&rt).iter(|| async { black_box(volatile.fetch(&miss).await) });
    });
    group.bench_function("key_value_fetch_hit", |b| {
        b.to_async(&rt).iter(|| async { black_box(key_value.fetch(&req).await) });
    });

    group.finish();
}

criterion_group!(
    benches,
    directive_parsing_benchmark,
    key_derivation_benchmark,
    entry_serialization_benchmark,
    strategy_benchmark,
);
criterion_main!(benches);
