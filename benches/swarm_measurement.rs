//! Benchmarks for swarm-level measurement and disruption.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use entrain::{Pattern, Swarm, SwarmOptions};

fn build_swarm(size: usize) -> Swarm {
    Swarm::with_options(
        size,
        Pattern::target(std::f64::consts::PI, Duration::from_millis(100), 0.7),
        SwarmOptions {
            seed: Some(7),
            ..SwarmOptions::default()
        },
    )
    .expect("bench swarm builds")
}

fn bench_measure_system_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("measure_system_pattern");
    for size in [250usize, 2_500] {
        let swarm = build_swarm(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &swarm, |b, swarm| {
            b.iter(|| black_box(swarm.measure_system_pattern()));
        });
    }
    group.finish();
}

fn bench_measure_coherence(c: &mut Criterion) {
    let swarm = build_swarm(2_500);
    c.bench_function("measure_coherence/2500", |b| {
        b.iter(|| black_box(swarm.measure_coherence()));
    });
}

fn bench_disrupt_agents(c: &mut Criterion) {
    let swarm = build_swarm(2_500);
    c.bench_function("disrupt_agents/2500/10pct", |b| {
        b.iter(|| swarm.disrupt_agents(black_box(0.1)));
    });
}

criterion_group!(
    benches,
    bench_measure_system_pattern,
    bench_measure_coherence,
    bench_disrupt_agents
);
criterion_main!(benches);
