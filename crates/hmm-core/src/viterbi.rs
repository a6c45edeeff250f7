//! Viterbi decoding in linear and log domains.
//!
//! # Algorithm
//!
//! Dynamic program over the best path score `delta[n, s]` (best joint
//! probability of any path ending in state `s` at step `n` having emitted
//! the observation prefix) with backpointers `phi[n, s]`:
//!
//! ```text
//! delta[0, s] = pi[s] * l(z[0], s)
//! delta[n, s] = l(z[n], s) * max_s' delta[n-1, s'] * P[s', s]
//! phi[n, s]   = argmax of the same
//! ```
//!
//! The log-domain variant replaces products with sums and substitutes
//! negative infinity for the log of zero; it is the production decoder. The
//! linear variant underflows on long sequences and exists for
//! short-sequence parity checks. Argmax ties resolve to the lowest state
//! index in both variants, which pins down the output on tie-heavy models.

use crate::error::HmmError;
use hmm_math::{argmax_first, ln_or_neg_inf};
use ndarray::{Array1, Array2};

/// Log-domain Viterbi over a precomputed (N, M) likelihood table.
///
/// Returns the most probable hidden state-id path (length N).
pub fn viterbi_log(
    transition: &Array2<f64>,
    initial: &Array1<f64>,
    likelihoods: &Array2<f64>,
) -> Result<Vec<usize>, HmmError> {
    let (n_steps, m) = likelihoods.dim();
    if n_steps == 0 {
        return Err(HmmError::EmptySequence);
    }
    let log_p = transition.mapv(ln_or_neg_inf);

    let mut delta = Array2::zeros((n_steps, m));
    let mut phi = Array2::<usize>::zeros((n_steps, m));

    for s in 0..m {
        delta[[0, s]] = ln_or_neg_inf(initial[s]) + ln_or_neg_inf(likelihoods[[0, s]]);
    }
    let mut scores = vec![0.0; m];
    for n in 1..n_steps {
        for s in 0..m {
            for (sp, slot) in scores.iter_mut().enumerate() {
                *slot = delta[[n - 1, sp]] + log_p[[sp, s]];
            }
            let best = argmax_first(&scores);
            delta[[n, s]] = ln_or_neg_inf(likelihoods[[n, s]]) + scores[best];
            phi[[n, s]] = best;
        }
    }

    Ok(backtrack(&delta, &phi))
}

/// Linear-domain Viterbi; identical output to [`viterbi_log`] on sequences
/// short enough to avoid underflow.
pub fn viterbi_linear(
    transition: &Array2<f64>,
    initial: &Array1<f64>,
    likelihoods: &Array2<f64>,
) -> Result<Vec<usize>, HmmError> {
    let (n_steps, m) = likelihoods.dim();
    if n_steps == 0 {
        return Err(HmmError::EmptySequence);
    }

    let mut delta = Array2::zeros((n_steps, m));
    let mut phi = Array2::<usize>::zeros((n_steps, m));

    for s in 0..m {
        delta[[0, s]] = initial[s] * likelihoods[[0, s]];
    }
    let mut scores = vec![0.0; m];
    for n in 1..n_steps {
        for s in 0..m {
            for (sp, slot) in scores.iter_mut().enumerate() {
                *slot = delta[[n - 1, sp]] * transition[[sp, s]];
            }
            let best = argmax_first(&scores);
            delta[[n, s]] = likelihoods[[n, s]] * scores[best];
            phi[[n, s]] = best;
        }
    }

    Ok(backtrack(&delta, &phi))
}

/// Reconstruct the state-id path from the final delta row and backpointers.
fn backtrack(delta: &Array2<f64>, phi: &Array2<usize>) -> Vec<usize> {
    let n_steps = delta.nrows();
    let mut path = vec![0usize; n_steps];
    path[n_steps - 1] = argmax_first(delta.row(n_steps - 1).as_slice().expect("row-major"));
    for n in (0..n_steps - 1).rev() {
        path[n] = phi[[n + 1, path[n + 1]]];
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fixture() -> (Array2<f64>, Array1<f64>) {
        let p = array![[0.7, 0.3], [0.4, 0.6]];
        let pi = array![0.6, 0.4];
        (p, pi)
    }

    #[test]
    fn linear_and_log_agree_on_short_sequences() {
        let (p, pi) = fixture();
        let l = array![[0.9, 0.2], [0.1, 0.8], [0.5, 0.5], [0.05, 0.95], [0.7, 0.3]];
        let a = viterbi_linear(&p, &pi, &l).unwrap();
        let b = viterbi_log(&p, &pi, &l).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decoding_is_deterministic() {
        let (p, pi) = fixture();
        let l = array![[0.9, 0.2], [0.1, 0.8], [0.5, 0.5]];
        let first = viterbi_log(&p, &pi, &l).unwrap();
        for _ in 0..5 {
            assert_eq!(viterbi_log(&p, &pi, &l).unwrap(), first);
        }
    }

    #[test]
    fn ties_resolve_to_lowest_state_id() {
        // Fully symmetric model: every step is a tie, so the path must stay
        // at state 0.
        let p = array![[0.5, 0.5], [0.5, 0.5]];
        let pi = array![0.5, 0.5];
        let l = array![[0.4, 0.4], [0.4, 0.4], [0.4, 0.4]];
        assert_eq!(viterbi_log(&p, &pi, &l).unwrap(), vec![0, 0, 0]);
        assert_eq!(viterbi_linear(&p, &pi, &l).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn single_observation_skips_the_recurrence() {
        let (p, pi) = fixture();
        let l = array![[0.2, 0.9]];
        assert_eq!(viterbi_log(&p, &pi, &l).unwrap(), vec![1]);
        assert_eq!(viterbi_linear(&p, &pi, &l).unwrap(), vec![1]);
    }

    #[test]
    fn log_domain_survives_linear_underflow() {
        // 5000 steps of 1e-80 likelihoods: the linear delta underflows to
        // all-zero, the log variant still tracks the emission preference.
        let (p, pi) = fixture();
        let mut l = Array2::zeros((5000, 2));
        for n in 0..5000 {
            l[[n, 0]] = 1e-80;
            l[[n, 1]] = 2e-80;
        }
        let path = viterbi_log(&p, &pi, &l).unwrap();
        assert!(path.iter().all(|&s| s == 1));
    }

    #[test]
    fn zero_probability_entries_become_neg_inf_not_errors() {
        let p = array![[0.0, 1.0], [1.0, 0.0]]; // deterministic alternation
        let pi = array![1.0, 0.0];
        let l = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        assert_eq!(viterbi_log(&p, &pi, &l).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let (p, pi) = fixture();
        let l = Array2::zeros((0, 2));
        assert_eq!(viterbi_log(&p, &pi, &l).unwrap_err(), HmmError::EmptySequence);
        assert_eq!(
            viterbi_linear(&p, &pi, &l).unwrap_err(),
            HmmError::EmptySequence
        );
    }
}
