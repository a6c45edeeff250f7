//! Scaled backward recursion.
//!
//! Consumes the scaling coefficients of a completed [`ForwardPass`] so that
//! beta stays on the same scale as alpha:
//!
//! ```text
//! beta[N-1, s] = 1                                          (unscaled anchor)
//! beta[n, s]   = c[n] * sum_s' P[s, s'] * l(z[n+1], s') * beta[n+1, s']
//! ```
//!
//! Taking the forward pass by reference makes the forward-before-backward
//! ordering a type-level contract; there is no cached state to read stale.

use crate::forward::ForwardPass;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Scaled backward probabilities for one sequence, shape (N, M).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackwardPass {
    pub beta: Array2<f64>,
}

/// Run the scaled backward recursion.
///
/// `likelihoods` must be the same (N, M) table the forward pass was computed
/// from, and `transition` the same (M, M) matrix.
pub fn backward(
    transition: &Array2<f64>,
    likelihoods: &Array2<f64>,
    fwd: &ForwardPass,
) -> BackwardPass {
    let (n_steps, m) = likelihoods.dim();
    debug_assert_eq!(fwd.alpha.dim(), (n_steps, m));
    debug_assert_eq!(transition.dim(), (m, m));

    let mut beta = Array2::zeros((n_steps, m));
    for s in 0..m {
        beta[[n_steps - 1, s]] = 1.0;
    }
    for n in (0..n_steps.saturating_sub(1)).rev() {
        for s in 0..m {
            let mut acc = 0.0;
            for sp in 0..m {
                acc += transition[[s, sp]] * likelihoods[[n + 1, sp]] * beta[[n + 1, sp]];
            }
            beta[[n, s]] = fwd.scale[n] * acc;
        }
    }
    BackwardPass { beta }
}
