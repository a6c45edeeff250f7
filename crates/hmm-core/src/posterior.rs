//! Per-timestep state and transition occupancy posteriors.
//!
//! Combines a completed forward and backward pass into:
//!
//! - `gamma[n, s]` — P(state = s at step n | full sequence), rows sum to 1;
//! - `ksi[n, s, s']` — P(state = s at n, state = s' at n+1 | full sequence),
//!   each (M, M) slice sums to 1, for n = 0..N-2.
//!
//! Both are normalized per timestep, so they are independent of the global
//! scaling. The marginalization identity `sum_s' ksi[n, s, s'] =
//! gamma[n, s]` holds by construction and doubles as a test oracle.

use crate::backward::BackwardPass;
use crate::error::HmmError;
use crate::forward::ForwardPass;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// State and transition occupancy for one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posteriors {
    /// Shape (N, M); every row sums to 1.
    pub gamma: Array2<f64>,
    /// Shape (N-1, M, M); every slice sums to 1. Empty for N = 1.
    pub ksi: Array3<f64>,
}

/// Combine forward/backward passes into occupancy posteriors.
///
/// `likelihoods` must be the same (N, M) table both passes were computed
/// from.
pub fn posteriors(
    transition: &Array2<f64>,
    likelihoods: &Array2<f64>,
    fwd: &ForwardPass,
    bwd: &BackwardPass,
) -> Result<Posteriors, HmmError> {
    let (n_steps, m) = likelihoods.dim();
    debug_assert_eq!(fwd.alpha.dim(), (n_steps, m));
    debug_assert_eq!(bwd.beta.dim(), (n_steps, m));

    let mut gamma = Array2::zeros((n_steps, m));
    for n in 0..n_steps {
        let mut norm = 0.0;
        for s in 0..m {
            let v = fwd.alpha[[n, s]] * bwd.beta[[n, s]];
            gamma[[n, s]] = v;
            norm += v;
        }
        if norm <= 0.0 || !norm.is_finite() {
            return Err(HmmError::ZeroLikelihood { step: n });
        }
        for s in 0..m {
            gamma[[n, s]] /= norm;
        }
    }

    let mut ksi = Array3::zeros((n_steps - 1, m, m));
    for n in 0..n_steps - 1 {
        let mut norm = 0.0;
        for s in 0..m {
            for sp in 0..m {
                let v = fwd.alpha[[n, s]]
                    * transition[[s, sp]]
                    * likelihoods[[n + 1, sp]]
                    * bwd.beta[[n + 1, sp]];
                ksi[[n, s, sp]] = v;
                norm += v;
            }
        }
        if norm <= 0.0 || !norm.is_finite() {
            return Err(HmmError::ZeroLikelihood { step: n + 1 });
        }
        for s in 0..m {
            for sp in 0..m {
                ksi[[n, s, sp]] /= norm;
            }
        }
    }

    Ok(Posteriors { gamma, ksi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backward::backward;
    use crate::forward::forward;
    use ndarray::{array, Array1};

    fn fixture() -> (Array2<f64>, Array1<f64>, Array2<f64>) {
        let p = array![[0.7, 0.3], [0.4, 0.6]];
        let pi = array![0.6, 0.4];
        let l = array![[0.9, 0.2], [0.1, 0.8], [0.5, 0.5], [0.3, 0.9]];
        (p, pi, l)
    }

    fn run(p: &Array2<f64>, pi: &Array1<f64>, l: &Array2<f64>) -> Posteriors {
        let fwd = forward(p, pi, l).unwrap();
        let bwd = backward(p, l, &fwd);
        posteriors(p, l, &fwd, &bwd).unwrap()
    }

    #[test]
    fn gamma_rows_sum_to_one() {
        let (p, pi, l) = fixture();
        let post = run(&p, &pi, &l);
        for n in 0..4 {
            let sum: f64 = post.gamma.row(n).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ksi_slices_sum_to_one() {
        let (p, pi, l) = fixture();
        let post = run(&p, &pi, &l);
        for n in 0..3 {
            let mut sum = 0.0;
            for s in 0..2 {
                for sp in 0..2 {
                    sum += post.ksi[[n, s, sp]];
                }
            }
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ksi_marginalizes_to_gamma() {
        let (p, pi, l) = fixture();
        let post = run(&p, &pi, &l);
        for n in 0..3 {
            for s in 0..2 {
                let marginal: f64 = (0..2).map(|sp| post.ksi[[n, s, sp]]).sum();
                assert!((marginal - post.gamma[[n, s]]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn single_observation_gamma_is_normalized_initial_times_emission() {
        let (p, pi, _) = fixture();
        let l = array![[0.9, 0.2]];
        let post = run(&p, &pi, &l);
        assert_eq!(post.ksi.dim(), (0, 2, 2));
        let norm = 0.6 * 0.9 + 0.4 * 0.2;
        assert!((post.gamma[[0, 0]] - 0.6 * 0.9 / norm).abs() < 1e-12);
        assert!((post.gamma[[0, 1]] - 0.4 * 0.2 / norm).abs() < 1e-12);
    }
}
