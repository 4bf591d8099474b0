//! Criterion micro-benchmarks for one registry step: write, finalize,
//! rotate.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tally_bench::{reference_profile, vector_profile, write_step};
use tally_comm::{broadcast, run_spmd};

/// Benchmark: full step over 128 scalar values.
fn bench_scalar_step(c: &mut Criterion) {
    let mut profile = reference_profile().unwrap();
    let mut step = 0usize;

    c.bench_function("scalar_step_128", |b| {
        b.iter(|| {
            write_step(&mut profile, |i| (i + step) as f64).unwrap();
            for p in profile.producers.clone() {
                profile.registry.finalize_producer(&p).unwrap();
            }
            profile.registry.copy_values_back();
            step += 1;
        });
    });
}

/// Benchmark: rotation alone for 16 vectors of 1024 reals.
fn bench_vector_rotate(c: &mut Criterion) {
    let mut profile = vector_profile().unwrap();

    c.bench_function("vector_rotate_16x1024", |b| {
        b.iter(|| {
            profile.registry.copy_values_back();
            black_box(&profile.registry);
        });
    });
}

/// Benchmark: flatten every real value with names.
fn bench_all_real_values(c: &mut Criterion) {
    let profile = reference_profile().unwrap();

    c.bench_function("all_real_values_128", |b| {
        b.iter(|| {
            let values = profile.registry.all_real_values();
            let names = profile.registry.all_real_full_names();
            black_box((values, names));
        });
    });
}

/// Benchmark: a 4-rank broadcast of 1024 reals, world setup included.
fn bench_thread_broadcast(c: &mut Criterion) {
    c.bench_function("thread_broadcast_4x1024", |b| {
        b.iter(|| {
            let out = run_spmd(4, |comm| {
                let mut v = vec![comm.rank() as f64; 1024];
                broadcast(comm.as_ref(), &mut v).unwrap();
                v[0]
            })
            .unwrap();
            black_box(out);
        });
    });
}

criterion_group!(
    benches,
    bench_scalar_step,
    bench_vector_rotate,
    bench_all_real_values,
    bench_thread_broadcast
);
criterion_main!(benches);
