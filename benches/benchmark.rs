//! Benchmarks for pipewright

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use pipewright::*;

/// A representative source-shuffle-batch chain over `n` samples.
fn sample_config(n: usize) -> serde_json::Value {
    json!([
        { "kind": "SourceWrapper", "data": (0..n as i64).collect::<Vec<i64>>() },
        { "kind": "Shuffler", "seed": 1, "buffer_size": 256 },
        { "kind": "Batcher", "batch_size": 32 }
    ])
}

fn benchmark_build(c: &mut Criterion) {
    let registry = Registry::with_builtins();
    let config = sample_config(1024);

    c.bench_function("build_pipeline", |b| {
        b.iter(|| build_pipeline_from_value(&registry, black_box(&config), Vec::new()).unwrap())
    });

    // Cost of recursive descriptor resolution by nesting depth.
    let mut group = c.benchmark_group("build_by_depth");
    for depth in [1usize, 4, 16].iter() {
        let mut value = json!({ "kind": "SourceWrapper", "data": [1, 2, 3, 4] });
        for _ in 0..*depth {
            value = json!({ "kind": "Batcher", "batch_size": 2, "source": value });
        }
        group.bench_with_input(BenchmarkId::from_parameter(depth), &value, |b, value| {
            b.iter(|| build_pipeline_from_value(&registry, black_box(value), Vec::new()).unwrap())
        });
    }
    group.finish();
}

fn benchmark_iteration(c: &mut Criterion) {
    let registry = Registry::with_builtins();

    let mut group = c.benchmark_group("iterate_by_size");
    for size in [256usize, 1024, 4096].iter() {
        let pipe =
            build_pipeline_from_value(&registry, &sample_config(*size), Vec::new()).unwrap();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pipe, |b, pipe| {
            b.iter(|| {
                let mut samples = 0usize;
                for batch in pipe.iter() {
                    samples += black_box(&batch).as_array().map_or(0, Vec::len);
                }
                samples
            })
        });
    }
    group.finish();
}

fn benchmark_shuffler(c: &mut Criterion) {
    let registry = Registry::with_builtins();

    let mut group = c.benchmark_group("shuffler_buffer");
    for buffer in [16usize, 256, 1024].iter() {
        let config = json!([
            { "kind": "SourceWrapper", "data": (0..4096i64).collect::<Vec<i64>>() },
            { "kind": "Shuffler", "seed": 9, "buffer_size": *buffer }
        ]);
        let pipe = build_pipeline_from_value(&registry, &config, Vec::new()).unwrap();
        group.throughput(Throughput::Elements(4096));
        group.bench_with_input(BenchmarkId::from_parameter(buffer), &pipe, |b, pipe| {
            b.iter(|| pipe.iter().count())
        });
    }
    group.finish();
}

fn benchmark_dict_batcher(c: &mut Criterion) {
    let registry = Registry::with_builtins();

    let mut group = c.benchmark_group("dict_batcher_rows");
    for rows in [128usize, 1024, 8192].iter() {
        let xs: Vec<i64> = (0..*rows as i64).collect();
        let config = json!({
            "kind": "DictBatcher",
            "batch_size": 32,
            "shuffle": true,
            "seed": 5,
            "data": { "x": xs.clone(), "y": xs }
        });
        let pipe = build_pipeline_from_value(&registry, &config, Vec::new()).unwrap();
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &pipe, |b, pipe| {
            b.iter(|| pipe.iter().count())
        });
    }
    group.finish();
}

fn benchmark_loader(c: &mut Criterion) {
    let dataset: SharedDataset = std::sync::Arc::new(InMemoryDataset::new(
        (0..8192).map(|i| json!(i)).collect::<Vec<_>>(),
    ));

    let mut group = c.benchmark_group("loader_pass");
    group.throughput(Throughput::Elements(8192));

    let sequential = Loader::new(std::sync::Arc::clone(&dataset)).batch_size(64);
    group.bench_function("sequential", |b| b.iter(|| sequential.iter().count()));

    let shuffled = Loader::new(std::sync::Arc::clone(&dataset))
        .batch_size(64)
        .shuffle(true)
        .seed(3);
    group.bench_function("shuffled", |b| b.iter(|| shuffled.iter().count()));

    let sharded = Loader::new(dataset)
        .batch_size(64)
        .shard(Shard::new(0, 4).expect("valid shard"));
    group.bench_function("sharded", |b| b.iter(|| sharded.iter().count()));

    group.finish();
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_iteration,
    benchmark_shuffler,
    benchmark_dict_batcher,
    benchmark_loader,
);

criterion_main!(benches);
