//! Hidden Markov model over an opaque state domain.
//!
//! A model owns the dense state-id mapping, the row-stochastic transition
//! matrix, the initial distribution, and one emission family. The emission
//! family is fixed at construction:
//!
//! - [`CallbackHmm`] integrates an arbitrary user emission callback;
//! - [`DiscreteHmm`] carries a symbol alphabet and a categorical table, and
//!   supports Baum-Welch reestimation from symbol sequences;
//! - [`GaussianHmm`] carries one multivariate Gaussian per state, and
//!   supports Baum-Welch reestimation from vector sequences.
//!
//! All inference entry points take observation sequences of the emission
//! family's observation type and translate state ids back to domain values
//! on the way out.

use crate::backward::{backward, BackwardPass};
use crate::baum_welch::{reestimate_discrete, reestimate_gaussian};
use crate::domain::IdMap;
use crate::emission::{
    likelihood_matrix, CallbackEmission, CategoricalEmission, Emission, GaussianEmission,
};
use crate::error::HmmError;
use crate::forward::{forward, ForwardPass};
use crate::posterior::{posteriors, Posteriors};
use crate::probability::{
    build_initial_vector, build_transition_matrix, EmissionProbability, InitialProbability,
    TransitionProbability,
};
use hmm_math::MultivariateGaussian;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Model with a generic user-callback emission.
pub type CallbackHmm<S, O> = HiddenMarkovModel<S, CallbackEmission<O, S>>;
/// Model with a discrete-categorical emission over a symbol alphabet.
pub type DiscreteHmm<S, Y> = HiddenMarkovModel<S, CategoricalEmission<Y>>;
/// Model with one multivariate Gaussian emission per state.
pub type GaussianHmm<S> = HiddenMarkovModel<S, GaussianEmission>;

/// Hidden Markov model: state map, transition matrix, initial distribution,
/// and an emission family.
#[derive(Debug)]
pub struct HiddenMarkovModel<S, E> {
    states: Arc<IdMap<S>>,
    transition: Array2<f64>,
    initial: Array1<f64>,
    emission: E,
}

impl<S, E> HiddenMarkovModel<S, E> {
    /// Number of hidden states M.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The ordered state list; position is the dense state id.
    pub fn states(&self) -> &[S] {
        self.states.values()
    }

    /// The (M, M) row-stochastic transition matrix.
    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.transition
    }

    /// The length-M initial distribution (not renormalized by the model).
    pub fn initial_distribution(&self) -> &Array1<f64> {
        &self.initial
    }

    pub fn emission(&self) -> &E {
        &self.emission
    }

    /// Most likely hidden state path for a sequence (log-domain Viterbi).
    pub fn decode<O>(&self, obs: &[O]) -> Result<Vec<S>, HmmError>
    where
        E: Emission<O>,
        S: Clone,
    {
        let l = likelihood_matrix(&self.emission, obs, self.num_states())?;
        let path = crate::viterbi::viterbi_log(&self.transition, &self.initial, &l)?;
        Ok(self.decode_ids(&path))
    }

    /// Linear-domain Viterbi; parity partner for [`decode`] on short
    /// sequences, underflows on long ones.
    ///
    /// [`decode`]: HiddenMarkovModel::decode
    pub fn decode_linear<O>(&self, obs: &[O]) -> Result<Vec<S>, HmmError>
    where
        E: Emission<O>,
        S: Clone,
    {
        let l = likelihood_matrix(&self.emission, obs, self.num_states())?;
        let path = crate::viterbi::viterbi_linear(&self.transition, &self.initial, &l)?;
        Ok(self.decode_ids(&path))
    }

    /// Sequence log-likelihood under the model.
    pub fn log_likelihood<O>(&self, obs: &[O]) -> Result<f64, HmmError>
    where
        E: Emission<O>,
    {
        Ok(self.forward_pass(obs)?.log_likelihood)
    }

    /// Scaled forward pass for a sequence.
    pub fn forward_pass<O>(&self, obs: &[O]) -> Result<ForwardPass, HmmError>
    where
        E: Emission<O>,
    {
        let l = likelihood_matrix(&self.emission, obs, self.num_states())?;
        forward(&self.transition, &self.initial, &l)
    }

    /// Scaled backward pass consuming a completed forward pass.
    pub fn backward_pass<O>(&self, obs: &[O], fwd: &ForwardPass) -> Result<BackwardPass, HmmError>
    where
        E: Emission<O>,
    {
        let l = likelihood_matrix(&self.emission, obs, self.num_states())?;
        Ok(backward(&self.transition, &l, fwd))
    }

    /// Per-timestep state and transition occupancy for a sequence.
    pub fn posteriors<O>(&self, obs: &[O]) -> Result<Posteriors, HmmError>
    where
        E: Emission<O>,
    {
        let l = likelihood_matrix(&self.emission, obs, self.num_states())?;
        let fwd = forward(&self.transition, &self.initial, &l)?;
        let bwd = backward(&self.transition, &l, &fwd);
        posteriors(&self.transition, &l, &fwd, &bwd)
    }

    fn decode_ids(&self, path: &[usize]) -> Vec<S>
    where
        S: Clone,
    {
        path.iter().map(|&id| self.states.value(id).clone()).collect()
    }

    fn assemble(
        transition: impl Fn(&S, &S) -> f64 + Send + Sync + 'static,
        initial: impl Fn(&S) -> f64 + Send + Sync + 'static,
        states: Vec<S>,
        emission: E,
    ) -> Result<Self, HmmError> {
        let states = Arc::new(IdMap::new(states));
        let m = states.len();
        let tp = TransitionProbability::new(transition, Arc::clone(&states));
        let transition = build_transition_matrix(&tp, m)?;
        let ip = InitialProbability::new(initial, Arc::clone(&states));
        let initial = build_initial_vector(&ip, m)?;
        Ok(Self {
            states,
            transition,
            initial,
            emission,
        })
    }
}

impl<S, O> CallbackHmm<S, O> {
    /// Build a model from three probability callbacks and an ordered state
    /// list. The emission callback is integrated as supplied, with no
    /// normalization.
    pub fn from_callbacks(
        transition: impl Fn(&S, &S) -> f64 + Send + Sync + 'static,
        emission: impl Fn(&O, &S) -> f64 + Send + Sync + 'static,
        initial: impl Fn(&S) -> f64 + Send + Sync + 'static,
        states: Vec<S>,
    ) -> Result<Self, HmmError> {
        let state_map = Arc::new(IdMap::new(states));
        let m = state_map.len();
        let tp = TransitionProbability::new(transition, Arc::clone(&state_map));
        let transition_matrix = build_transition_matrix(&tp, m)?;
        let ip = InitialProbability::new(initial, Arc::clone(&state_map));
        let initial_vector = build_initial_vector(&ip, m)?;
        let emission = CallbackEmission::new(EmissionProbability::new(
            emission,
            Arc::clone(&state_map),
        ));
        Ok(Self {
            states: state_map,
            transition: transition_matrix,
            initial: initial_vector,
            emission,
        })
    }
}

impl<S, Y: PartialEq> DiscreteHmm<S, Y> {
    /// Build a discrete model. The emission callback is evaluated over the
    /// full symbol-by-state cross product into a (K, M) table whose columns
    /// are renormalized per state.
    pub fn discrete(
        transition: impl Fn(&S, &S) -> f64 + Send + Sync + 'static,
        emission: impl Fn(&Y, &S) -> f64,
        initial: impl Fn(&S) -> f64 + Send + Sync + 'static,
        states: Vec<S>,
        symbols: Vec<Y>,
    ) -> Result<Self, HmmError> {
        let k = symbols.len();
        let mut table = Array2::zeros((k, states.len()));
        for (kid, symbol) in symbols.iter().enumerate() {
            for (s, state) in states.iter().enumerate() {
                let v = emission(symbol, state);
                if !v.is_finite() || v < 0.0 {
                    return Err(HmmError::InvalidProbability {
                        context: "emission callback",
                        value: v,
                    });
                }
                table[[kid, s]] = v;
            }
        }
        let emission = CategoricalEmission::new(symbols, table)?;
        Self::assemble(transition, initial, states, emission)
    }

    /// The (K, M) emission table; column `s` is state `s`'s distribution
    /// over symbols.
    pub fn emission_table(&self) -> &Array2<f64> {
        self.emission.table()
    }

    /// Run `iterations` full-batch Baum-Welch passes over the training
    /// sequences, mutating the transition matrix, emission table, and
    /// initial distribution in place.
    pub fn reestimate(&mut self, sequences: &[Vec<Y>], iterations: usize) -> Result<(), HmmError> {
        reestimate_discrete(
            &mut self.transition,
            &mut self.initial,
            &mut self.emission,
            sequences,
            iterations,
        )
    }
}

impl<S> GaussianHmm<S> {
    /// Build a Gaussian model from per-state components.
    pub fn gaussian(
        transition: impl Fn(&S, &S) -> f64 + Send + Sync + 'static,
        initial: impl Fn(&S) -> f64 + Send + Sync + 'static,
        states: Vec<S>,
        components: Vec<MultivariateGaussian>,
    ) -> Result<Self, HmmError> {
        if components.len() != states.len() {
            return Err(HmmError::DimensionMismatch {
                expected: states.len(),
                got: components.len(),
            });
        }
        let emission = GaussianEmission::new(components)?;
        Self::assemble(transition, initial, states, emission)
    }

    /// Per-state emission components.
    pub fn emission_components(&self) -> &[MultivariateGaussian] {
        self.emission.components()
    }

    /// Run `iterations` full-batch Baum-Welch passes over the training
    /// sequences, mutating the transition matrix, emission components, and
    /// initial distribution in place. Means are finalized across the whole
    /// batch before covariances are computed.
    pub fn reestimate<O: AsRef<[f64]>>(
        &mut self,
        sequences: &[Vec<O>],
        iterations: usize,
    ) -> Result<(), HmmError> {
        reestimate_gaussian(
            &mut self.transition,
            &mut self.initial,
            &mut self.emission,
            sequences,
            iterations,
        )
    }
}
