//! End-to-end decoding over a model built from user callbacks.
//!
//! Ten hidden states on a uniform chain, each emitting a Gaussian bump
//! centered at its own index. With a flat transition matrix the likelihood
//! term dominates every Viterbi step, so the decoded path must read back the
//! nearest state for every observation.

use hmm_core::CallbackHmm;

const SIGMA: f64 = 0.75;

fn gaussian_bump(z: f64, center: f64) -> f64 {
    let d = (z - center) / SIGMA;
    (-0.5 * d * d).exp() / (SIGMA * (2.0 * std::f64::consts::PI).sqrt())
}

fn uniform_chain() -> CallbackHmm<u32, f64> {
    CallbackHmm::from_callbacks(
        |_, _| 0.1,
        |&z: &f64, &s: &u32| gaussian_bump(z, s as f64),
        |_| 0.1,
        (0..10).collect(),
    )
    .expect("uniform chain is a valid model")
}

#[test]
fn decode_reads_back_the_nearest_state() {
    let model = uniform_chain();
    let obs = vec![3.0, 7.0, 1.0, 9.0, 0.0, 5.0, 5.0, 2.0, 8.0, 4.0];
    let path = model.decode(&obs).unwrap();
    assert_eq!(path, vec![3, 7, 1, 9, 0, 5, 5, 2, 8, 4]);
}

#[test]
fn noisy_observations_still_snap_to_the_nearest_state() {
    let model = uniform_chain();
    let obs = vec![3.2, 6.8, 1.1, 8.9, 0.3, 4.6];
    let path = model.decode(&obs).unwrap();
    assert_eq!(path, vec![3, 7, 1, 9, 0, 5]);
}

#[test]
fn linear_and_log_decoders_agree_on_short_sequences() {
    let model = uniform_chain();
    let obs = vec![0.5, 2.5, 2.5, 9.0, 9.0, 4.0];
    assert_eq!(
        model.decode(&obs).unwrap(),
        model.decode_linear(&obs).unwrap()
    );
}

#[test]
fn log_likelihood_is_finite_for_long_sequences() {
    let model = uniform_chain();
    // Long enough to underflow any unscaled forward recursion.
    let obs: Vec<f64> = (0..5_000).map(|n| (n % 10) as f64).collect();
    let ll = model.log_likelihood(&obs).unwrap();
    assert!(ll.is_finite());
    assert!(ll < 0.0);
}

#[test]
fn posterior_concentrates_on_the_decoded_state() {
    let model = uniform_chain();
    let obs = vec![2.0, 6.0, 6.0, 1.0];
    let post = model.posteriors(&obs).unwrap();
    let path = model.decode(&obs).unwrap();
    for (n, &s) in path.iter().enumerate() {
        assert!(
            post.gamma[[n, s as usize]] > 0.5,
            "gamma[{n}, {s}] = {} should dominate",
            post.gamma[[n, s as usize]]
        );
    }
}
