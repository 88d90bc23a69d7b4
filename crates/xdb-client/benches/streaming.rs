//! Row streaming throughput across prefetch sizes.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use xdb_client::{Client, ClientOptions};
use xdb_testing::{MockSource, ReplyScript, ResultSetScript};

const ROWS: i64 = 10_000;

fn source() -> MockSource {
    let script = ReplyScript::new().result_set(ResultSetScript::ints("n", 0..ROWS));
    MockSource::fixed(script)
}

fn bench_prefetch(c: &mut Criterion) {
    let client = Client::new(Arc::new(source()), ClientOptions::default()).unwrap();
    let session = client.get_session().unwrap();

    let mut group = c.benchmark_group("get_row");
    group.throughput(Throughput::Elements(ROWS as u64));
    for prefetch in [1u64, 16, 256, 1024, 8192] {
        group.bench_with_input(BenchmarkId::from_parameter(prefetch), &prefetch, |b, &n| {
            b.iter(|| {
                let mut result = session.sql("SELECT n").unwrap();
                result.set_prefetch(n);
                let mut count = 0;
                while let Some(row) = result.get_row().unwrap() {
                    black_box(row.get(0));
                    count += 1;
                }
                count
            });
        });
    }
    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let client = Client::new(Arc::new(source()), ClientOptions::default()).unwrap();
    let session = client.get_session().unwrap();

    c.bench_function("store_then_read", |b| {
        b.iter(|| {
            let mut result = session.sql("SELECT n").unwrap();
            result.store().unwrap();
            black_box(result.fetch_all().unwrap().len())
        });
    });
}

criterion_group!(benches, bench_prefetch, bench_store);
criterion_main!(benches);
