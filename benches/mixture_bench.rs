//! Benchmarks for mixture sampling.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use finite_mixture_sampler::mixture::{
    orthonormal_basis, sample_mixture, MixtureSampler, MixtureSpec, SamplerConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn basis_benchmark(c: &mut Criterion) {
    c.bench_function("orthonormal_basis_k50", |b| {
        b.iter(|| orthonormal_basis(black_box(50)))
    });
}

fn single_draw_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("sample_mixture_k10_uncached", |b| {
        b.iter(|| sample_mixture(black_box(400.0), black_box(50.0), black_box(10), &mut rng))
    });

    let mut sampler = MixtureSampler::new(SamplerConfig::default().with_seed(42)).unwrap();
    let spec = MixtureSpec::new(400.0, 50.0, 10).unwrap();
    c.bench_function("sampler_k10_cached", |b| b.iter(|| sampler.sample(black_box(&spec))));
}

fn batch_benchmark(c: &mut Criterion) {
    let spec = MixtureSpec::new(400.0, 50.0, 20).unwrap();

    c.bench_function("sample_many_1000_k20", |b| {
        b.iter(|| {
            let mut sampler = MixtureSampler::new(SamplerConfig::default().with_seed(42)).unwrap();
            sampler.sample_many(&spec, black_box(1000))
        })
    });

    c.bench_function("sample_parallel_1000_k20", |b| {
        b.iter(|| {
            let mut sampler = MixtureSampler::new(SamplerConfig::default().with_seed(42)).unwrap();
            sampler.sample_parallel(&spec, black_box(1000))
        })
    });
}

criterion_group!(benches, basis_benchmark, single_draw_benchmark, batch_benchmark);
criterion_main!(benches);
