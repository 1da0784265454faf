//! Benchmarks for the circular-statistics hot path.
//!
//! The order parameter is computed over every agent phase on every tick,
//! so its cost bounds the tick rate for large swarms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use entrain::domain::models::phase;

fn random_phases(n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.gen::<f64>() * phase::TAU).collect()
}

fn bench_order_parameter(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_parameter");
    for n in [100usize, 1_000, 10_000] {
        let phases = random_phases(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &phases, |b, phases| {
            b.iter(|| phase::order_parameter(black_box(phases)));
        });
    }
    group.finish();
}

fn bench_circular_mean(c: &mut Criterion) {
    let phases = random_phases(1_000);
    c.bench_function("circular_mean/1000", |b| {
        b.iter(|| phase::circular_mean(black_box(&phases)));
    });
}

fn bench_phase_convergence(c: &mut Criterion) {
    let phases = random_phases(1_000);
    c.bench_function("phase_convergence/1000", |b| {
        b.iter(|| phase::phase_convergence(black_box(&phases), std::f64::consts::PI));
    });
}

criterion_group!(
    benches,
    bench_order_parameter,
    bench_circular_mean,
    bench_phase_convergence
);
criterion_main!(benches);
