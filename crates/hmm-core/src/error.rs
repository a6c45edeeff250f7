//! Error taxonomy for model construction, inference, and learning.

use thiserror::Error;

/// Errors raised by model construction, inference, and learning.
///
/// Every variant is fatal for the operation that raised it: computations are
/// deterministic over supplied data, so nothing is retried, and no condition
/// is silently propagated as NaN or infinity. Recovery (for example skipping
/// a degenerate sequence before the next training batch) belongs to the
/// caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    /// A transition-matrix row evaluated to zero total mass.
    #[error("transition row for state {state} sums to zero and cannot be normalized")]
    DegenerateTransitionRow { state: usize },

    /// An emission table column (the distribution for one state) evaluated
    /// to zero total mass.
    #[error("emission distribution for state {state} sums to zero and cannot be normalized")]
    DegenerateEmissionColumn { state: usize },

    /// A user callback returned a negative or non-finite probability.
    #[error("{context} produced an invalid probability {value}")]
    InvalidProbability { context: &'static str, value: f64 },

    /// A covariance matrix was rejected (wrong shape, non-finite entries,
    /// or not positive definite).
    #[error("covariance for state {state} is not positive definite")]
    InvalidCovariance { state: usize },

    /// An observation sequence (or training batch) was empty.
    #[error("observation sequence is empty")]
    EmptySequence,

    /// Mismatched dimensions between a sequence and the model parameters.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A discrete observation is not part of the model's symbol alphabet.
    #[error("observation at position {position} is not in the symbol alphabet")]
    UnknownSymbol { position: usize },

    /// The observation at `step` is impossible under the current parameters,
    /// so the forward scaling coefficient is undefined.
    #[error("zero likelihood at step {step}: observation impossible under current parameters")]
    ZeroLikelihood { step: usize },

    /// A state accumulated zero posterior occupancy across a training batch,
    /// leaving its emission parameters undefined.
    #[error("state {state} has zero posterior occupancy in this batch")]
    ZeroOccupancy { state: usize },
}
