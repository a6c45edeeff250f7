//! Multivariate Gaussian density with a cached Cholesky factorization.
//!
//! Emission densities are evaluated once per observation and state on the
//! inference hot path, so the factorization and log-determinant are computed
//! when the parameters are set, not per evaluation.

use ndarray::{Array1, Array2};
use serde::Serialize;

const LN_2PI: f64 = 1.837_877_066_409_345_5; // ln(2*pi)

/// Multivariate normal distribution N(mean, covariance).
///
/// Construction fails (returns `None`) when the covariance is not square,
/// does not match the mean dimension, contains non-finite entries, or is not
/// positive definite.
#[derive(Debug, Clone, Serialize)]
pub struct MultivariateGaussian {
    mean: Array1<f64>,
    covariance: Array2<f64>,
    #[serde(skip)]
    chol_lower: Array2<f64>,
    #[serde(skip)]
    log_det: f64,
}

impl MultivariateGaussian {
    /// Create a distribution, validating and factorizing the covariance.
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Option<Self> {
        let d = mean.len();
        if covariance.nrows() != d || covariance.ncols() != d {
            return None;
        }
        if mean.iter().any(|v| !v.is_finite()) || covariance.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let chol_lower = cholesky_lower(&covariance)?;
        let log_det = 2.0 * chol_lower.diag().iter().map(|v| v.ln()).sum::<f64>();
        Some(Self {
            mean,
            covariance,
            chol_lower,
            log_det,
        })
    }

    /// Standard normal of the given dimension (zero mean, identity covariance).
    pub fn standard(dim: usize) -> Self {
        // Identity is always positive definite.
        Self::new(Array1::zeros(dim), Array2::eye(dim)).unwrap()
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Log density at `x`. `x` must have the distribution's dimension.
    pub fn log_pdf(&self, x: &[f64]) -> f64 {
        let d = self.dim();
        debug_assert_eq!(x.len(), d);
        // Solve L y = (x - mean) by forward substitution; the quadratic form
        // (x-mean)' Sigma^-1 (x-mean) is then y'y.
        let mut y = Array1::zeros(d);
        for i in 0..d {
            let mut acc = x[i] - self.mean[i];
            for j in 0..i {
                acc -= self.chol_lower[[i, j]] * y[j];
            }
            y[i] = acc / self.chol_lower[[i, i]];
        }
        let quad: f64 = y.iter().map(|v| v * v).sum();
        -0.5 * (d as f64 * LN_2PI + self.log_det + quad)
    }

    /// Density at `x`.
    pub fn pdf(&self, x: &[f64]) -> f64 {
        self.log_pdf(x).exp()
    }
}

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
///
/// Returns `None` when a pivot is non-positive, which rejects indefinite and
/// singular inputs.
fn cholesky_lower(a: &Array2<f64>) -> Option<Array2<f64>> {
    let d = a.nrows();
    let mut l = Array2::zeros((d, d));
    for i in 0..d {
        for j in 0..=i {
            let mut acc = a[[i, j]];
            for k in 0..j {
                acc -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if acc <= 0.0 || !acc.is_finite() {
                    return None;
                }
                l[[i, j]] = acc.sqrt();
            } else {
                l[[i, j]] = acc / l[[j, j]];
            }
        }
    }
    Some(l)
}
