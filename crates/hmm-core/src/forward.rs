//! Scaled forward recursion.
//!
//! # Algorithm
//!
//! Classic scaled-forward: at every step the raw forward column is
//! renormalized to sum to 1, and the reciprocal of the raw sum is recorded
//! as the scaling coefficient `c[n]`. The sequence log-likelihood is then
//! `-sum(ln c[n])`, which never underflows regardless of sequence length.
//!
//! ```text
//! alpha[0, s]   = l(z[0], s) * pi[s]                      (then scaled)
//! alpha[n+1, s] = l(z[n+1], s) * sum_s' alpha[n, s'] * P[s', s]
//! c[n]          = 1 / raw column sum at step n
//! ```
//!
//! A raw sum of zero means the observation at that step is impossible under
//! the current parameters; the reciprocal is undefined and the pass fails
//! with [`HmmError::ZeroLikelihood`] instead of yielding inf or NaN.

use crate::error::HmmError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Output of one scaled forward pass over a single sequence.
///
/// Owning this value is the proof that a forward pass completed: the
/// backward and posterior engines take it by reference, so they cannot be
/// invoked out of order or against stale scaling coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardPass {
    /// Scaled forward probabilities, shape (N, M); every row sums to 1.
    pub alpha: Array2<f64>,
    /// Scaling coefficients `c[n]`, length N.
    pub scale: Array1<f64>,
    /// log P(sequence | model) = -sum(ln c[n]).
    pub log_likelihood: f64,
}

/// Run the scaled forward recursion over a precomputed likelihood table.
///
/// `likelihoods` is the (N, M) per-step emission table, `transition` the
/// (M, M) row-stochastic matrix, `initial` the length-M initial
/// distribution.
pub fn forward(
    transition: &Array2<f64>,
    initial: &Array1<f64>,
    likelihoods: &Array2<f64>,
) -> Result<ForwardPass, HmmError> {
    let (n_steps, m) = likelihoods.dim();
    if n_steps == 0 {
        return Err(HmmError::EmptySequence);
    }
    if transition.dim() != (m, m) {
        return Err(HmmError::DimensionMismatch {
            expected: m,
            got: transition.nrows(),
        });
    }
    if initial.len() != m {
        return Err(HmmError::DimensionMismatch {
            expected: m,
            got: initial.len(),
        });
    }

    let mut alpha = Array2::zeros((n_steps, m));
    let mut scale = Array1::zeros(n_steps);
    let mut log_likelihood = 0.0;

    for s in 0..m {
        alpha[[0, s]] = likelihoods[[0, s]] * initial[s];
    }
    log_likelihood += rescale_step(&mut alpha, &mut scale, 0)?;

    for n in 1..n_steps {
        for s in 0..m {
            let mut acc = 0.0;
            for sp in 0..m {
                acc += alpha[[n - 1, sp]] * transition[[sp, s]];
            }
            alpha[[n, s]] = likelihoods[[n, s]] * acc;
        }
        log_likelihood += rescale_step(&mut alpha, &mut scale, n)?;
    }

    Ok(ForwardPass {
        alpha,
        scale,
        log_likelihood,
    })
}

/// Normalize row `n` of `alpha` in place, record `c[n]`, and return the log
/// of the raw sum (the step's contribution to the log-likelihood).
fn rescale_step(
    alpha: &mut Array2<f64>,
    scale: &mut Array1<f64>,
    n: usize,
) -> Result<f64, HmmError> {
    let raw: f64 = alpha.row(n).sum();
    if raw <= 0.0 || !raw.is_finite() {
        return Err(HmmError::ZeroLikelihood { step: n });
    }
    let c = 1.0 / raw;
    scale[n] = c;
    alpha.row_mut(n).mapv_inplace(|v| v * c);
    Ok(raw.ln())
}
