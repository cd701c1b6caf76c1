//! Performance benchmarks: optimized vs unoptimized programs.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ram_interpreter::{Config, Engine, EngineConfig, PipelineConfig, compile, programs};

fn run(config: &Config, n: i32) -> Engine {
    let engine = compile(&programs::transitive_closure(), config);
    for edge in programs::chain(n) {
        engine.insert("edge", &edge).unwrap();
    }
    engine.run();
    engine
}

// ─── Transitive Closure ─────────────────────────────────────────────

fn bench_transitive_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_closure");
    let optimized = Config::default();
    let unoptimized = Config::default().with_pipeline(PipelineConfig::empty());

    for &n in &[50, 100, 200] {
        group.bench_with_input(BenchmarkId::new("optimized", n), &n, |b, &n| {
            b.iter(|| run(&optimized, n));
        });

        group.bench_with_input(BenchmarkId::new("unoptimized", n), &n, |b, &n| {
            b.iter(|| run(&unoptimized, n));
        });
    }
    group.finish();
}

// ─── Parallel Scans ─────────────────────────────────────────────────

fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_closure");
    group.sample_size(20);

    for &threads in &[1, 2, 4] {
        let config = Config::default().with_engine(
            EngineConfig::default()
                .with_num_threads(threads)
                .with_parallel_threshold(64),
        );
        group.bench_with_input(BenchmarkId::new("threads", threads), &config, |b, config| {
            b.iter(|| run(config, 300));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transitive_closure, bench_parallel);
criterion_main!(benches);
