//! Probability adapters wrapping user callbacks.
//!
//! Each adapter stores the shared state map and a boxed callback. `eval`
//! methods accept dense integer ids (never raw domain values), translate the
//! ids back to domain values, and invoke the callback. The adapters perform
//! no normalization; only [`build_transition_matrix`] renormalizes, and only
//! row-wise. Out-of-range ids panic (programming error); negative or
//! non-finite callback outputs are configuration errors surfaced as
//! [`HmmError::InvalidProbability`].

use crate::domain::IdMap;
use crate::error::HmmError;
use ndarray::{Array1, Array2};
use std::fmt;
use std::sync::Arc;

/// Transition probability callback over ordered state pairs.
pub struct TransitionProbability<S> {
    states: Arc<IdMap<S>>,
    callback: Box<dyn Fn(&S, &S) -> f64 + Send + Sync>,
}

impl<S> TransitionProbability<S> {
    pub fn new(
        callback: impl Fn(&S, &S) -> f64 + Send + Sync + 'static,
        states: Arc<IdMap<S>>,
    ) -> Self {
        Self {
            states,
            callback: Box::new(callback),
        }
    }

    /// Evaluate the callback over parallel slices of source and target ids.
    pub fn eval(&self, from: &[usize], to: &[usize]) -> Vec<f64> {
        assert_eq!(from.len(), to.len(), "id slices must have equal length");
        from.iter()
            .zip(to)
            .map(|(&i, &j)| (self.callback)(self.states.value(i), self.states.value(j)))
            .collect()
    }
}

impl<S> fmt::Debug for TransitionProbability<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionProbability")
            .field("num_states", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Emission probability callback over (observation, state) pairs.
pub struct EmissionProbability<O, S> {
    states: Arc<IdMap<S>>,
    callback: Box<dyn Fn(&O, &S) -> f64 + Send + Sync>,
}

impl<O, S> EmissionProbability<O, S> {
    pub fn new(
        callback: impl Fn(&O, &S) -> f64 + Send + Sync + 'static,
        states: Arc<IdMap<S>>,
    ) -> Self {
        Self {
            states,
            callback: Box::new(callback),
        }
    }

    /// Evaluate one observation against a slice of state ids.
    pub fn eval(&self, obs: &O, states: &[usize]) -> Vec<f64> {
        states
            .iter()
            .map(|&s| (self.callback)(obs, self.states.value(s)))
            .collect()
    }

    /// Evaluate one observation against one state id.
    pub fn eval_one(&self, obs: &O, state: usize) -> f64 {
        (self.callback)(obs, self.states.value(state))
    }
}

impl<O, S> fmt::Debug for EmissionProbability<O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionProbability")
            .field("num_states", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Initial state probability callback.
pub struct InitialProbability<S> {
    states: Arc<IdMap<S>>,
    callback: Box<dyn Fn(&S) -> f64 + Send + Sync>,
}

impl<S> InitialProbability<S> {
    pub fn new(callback: impl Fn(&S) -> f64 + Send + Sync + 'static, states: Arc<IdMap<S>>) -> Self {
        Self {
            states,
            callback: Box::new(callback),
        }
    }

    /// Evaluate the callback over a slice of state ids.
    pub fn eval(&self, states: &[usize]) -> Vec<f64> {
        states
            .iter()
            .map(|&s| (self.callback)(self.states.value(s)))
            .collect()
    }
}

impl<S> fmt::Debug for InitialProbability<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialProbability")
            .field("num_states", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Build the row-stochastic transition matrix from the transition adapter.
///
/// Evaluates the callback over the full ordered cross product of state ids
/// (M² evaluations, row-major), then divides each row by its sum. A row that
/// sums to zero is a fatal configuration error, reported instead of being
/// propagated as NaN.
pub fn build_transition_matrix<S>(
    transition: &TransitionProbability<S>,
    m: usize,
) -> Result<Array2<f64>, HmmError> {
    let from: Vec<usize> = (0..m).flat_map(|i| std::iter::repeat(i).take(m)).collect();
    let to: Vec<usize> = (0..m).flat_map(|_| 0..m).collect();
    let raw = transition.eval(&from, &to);

    let mut p = Array2::from_shape_vec((m, m), raw).expect("cross product has m*m entries");
    for &v in p.iter() {
        if !v.is_finite() || v < 0.0 {
            return Err(HmmError::InvalidProbability {
                context: "transition callback",
                value: v,
            });
        }
    }
    for (s, mut row) in p.rows_mut().into_iter().enumerate() {
        let sum: f64 = row.sum();
        if sum <= 0.0 {
            return Err(HmmError::DegenerateTransitionRow { state: s });
        }
        row.mapv_inplace(|v| v / sum);
    }
    Ok(p)
}

/// Build the initial distribution vector from the initial adapter.
///
/// Values are validated finite and non-negative but not renormalized; the
/// caller owns normalization of the initial distribution.
pub fn build_initial_vector<S>(
    initial: &InitialProbability<S>,
    m: usize,
) -> Result<Array1<f64>, HmmError> {
    let ids: Vec<usize> = (0..m).collect();
    let pi = initial.eval(&ids);
    for &v in &pi {
        if !v.is_finite() || v < 0.0 {
            return Err(HmmError::InvalidProbability {
                context: "initial callback",
                value: v,
            });
        }
    }
    Ok(Array1::from_vec(pi))
}
