//! Run with: cargo bench --bench coherence_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phasecoh::{
    CoherenceMeasurement, FftHelper2d, Field, MonteCarloConfig, MonteCarloRunner, NullModel, WindowKind,
    WindowedConfig,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn noise(seed: u64, n: usize) -> Field {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Field::from_fn(n, n, |_, _| rng.gen::<f64>() - 0.5).unwrap()
}

fn bench_windowed_curve(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowed_curve");

    for n in [64usize, 128, 256] {
        let a = noise(1, n);
        let b = noise(2, n);
        let m = CoherenceMeasurement::windowed(
            WindowedConfig {
                window: WindowKind::Hann,
                ..WindowedConfig::default()
            },
            &[4.0, 8.0, 12.0],
            a.shape(),
        )
        .unwrap();

        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_with_input(BenchmarkId::new("measure", n), &n, |bench, _| {
            bench.iter(|| m.measure(black_box(&a), black_box(&b)).unwrap())
        });
    }

    group.finish();
}

fn bench_surrogates(c: &mut Criterion) {
    let mut group = c.benchmark_group("surrogates");
    let field = noise(3, 128);
    let helper = FftHelper2d::new(128, 128).unwrap();

    for model in [NullModel::GlobalPhaseRandomize, NullModel::RowCircularShift] {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        group.bench_function(model.name(), |bench| {
            bench.iter(|| model.surrogate(black_box(&field), &helper, &mut rng).unwrap())
        });
    }

    group.finish();
}

fn bench_monte_carlo(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    group.sample_size(10);
    let a = noise(5, 64);
    let b = noise(6, 64);

    for threads in [1usize, 4] {
        let m = CoherenceMeasurement::direct(&[(8.0, 8.0), (8.0, 12.0)], a.shape()).unwrap();
        let runner = MonteCarloRunner::new(
            m,
            MonteCarloConfig {
                trials: 100,
                threads,
                ..MonteCarloConfig::default()
            },
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("direct_100_trials", threads), &threads, |bench, _| {
            bench.iter(|| runner.run(black_box(&a), black_box(&b)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_windowed_curve, bench_surrogates, bench_monte_carlo);
criterion_main!(benches);
