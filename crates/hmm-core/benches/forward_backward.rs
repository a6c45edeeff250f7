//! Criterion benchmarks for the inference hot paths.
//!
//! Inputs are deterministic so runs are comparable across machines and CI;
//! the likelihood tables are synthesized from a fixed recurrence rather
//! than sampled.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hmm_core::{backward, forward, posteriors, viterbi_log};
use ndarray::{Array1, Array2};

/// Sticky ring transition matrix: mass 0.8 on self, the rest spread over
/// the two ring neighbors.
fn ring_transition(m: usize) -> Array2<f64> {
    let mut p = Array2::zeros((m, m));
    for s in 0..m {
        p[[s, s]] = 0.8;
        p[[s, (s + 1) % m]] = 0.1;
        p[[s, (m + s - 1) % m]] = 0.1;
    }
    p
}

/// Deterministic pseudo-random likelihood table in (0.05, 1.0).
fn likelihood_table(n: usize, m: usize) -> Array2<f64> {
    let mut x = 0.372_f64;
    Array2::from_shape_fn((n, m), |_| {
        x = (x * 997.0 + 0.113).fract();
        0.05 + 0.95 * x
    })
}

fn bench_inference(c: &mut Criterion) {
    let m = 8;
    let p = ring_transition(m);
    let pi = Array1::from_elem(m, 1.0 / m as f64);

    let mut group = c.benchmark_group("inference");

    for n in [64usize, 256, 1024] {
        let l = likelihood_table(n, m);

        group.bench_with_input(BenchmarkId::new("forward", n), &l, |b, l| {
            b.iter(|| {
                let fwd = forward(black_box(&p), black_box(&pi), black_box(l)).unwrap();
                black_box(fwd.log_likelihood);
            })
        });

        group.bench_with_input(BenchmarkId::new("viterbi_log", n), &l, |b, l| {
            b.iter(|| {
                let path = viterbi_log(black_box(&p), black_box(&pi), black_box(l)).unwrap();
                black_box(path.len());
            })
        });

        group.bench_with_input(BenchmarkId::new("posteriors", n), &l, |b, l| {
            b.iter(|| {
                let fwd = forward(black_box(&p), black_box(&pi), black_box(l)).unwrap();
                let bwd = backward(black_box(&p), black_box(l), &fwd);
                let post = posteriors(black_box(&p), black_box(l), &fwd, &bwd).unwrap();
                black_box(post.gamma[[0, 0]]);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_inference);
criterion_main!(benches);
