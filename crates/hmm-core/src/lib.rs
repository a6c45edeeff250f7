//! Hidden Markov model inference and learning.
//!
//! This library models sequential data generated by an unobserved Markov
//! chain emitting observable values, and provides the three canonical
//! operations on such models:
//!
//! - **Decoding**: most-likely hidden-state path recovery (Viterbi, in
//!   linear and log domains),
//! - **Evaluation**: sequence log-likelihood via the scaled
//!   forward/backward recursions,
//! - **Learning**: Baum-Welch (EM) parameter reestimation for discrete and
//!   multivariate-Gaussian emission families.
//!
//! States and symbols are opaque domain values; the library maps them to
//! dense integer ids once at construction and translates back at the API
//! boundary. Each inference stage returns its outputs explicitly (a forward
//! pass is an argument to the backward pass, both are arguments to the
//! posterior computation), so stage ordering is enforced by the type system
//! rather than by runtime staleness checks.

pub mod backward;
mod baum_welch;
pub mod domain;
pub mod emission;
pub mod error;
pub mod forward;
pub mod model;
pub mod posterior;
pub mod probability;
pub mod viterbi;

pub use backward::{backward, BackwardPass};
pub use domain::IdMap;
pub use emission::{
    likelihood_matrix, CallbackEmission, CategoricalEmission, Emission, GaussianEmission,
};
pub use error::HmmError;
pub use forward::{forward, ForwardPass};
pub use model::{CallbackHmm, DiscreteHmm, GaussianHmm, HiddenMarkovModel};
pub use posterior::{posteriors, Posteriors};
pub use probability::{EmissionProbability, InitialProbability, TransitionProbability};
pub use viterbi::{viterbi_linear, viterbi_log};

pub use hmm_math::MultivariateGaussian;
