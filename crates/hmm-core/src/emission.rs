//! Emission families behind a single likelihood capability.
//!
//! The three families (generic callback, discrete categorical, multivariate
//! Gaussian) all expose `likelihood(observation, state_id)`. The family is
//! selected at model construction; nothing downstream inspects which variant
//! it is talking to. Each family carries its own parameter storage, and the
//! discrete and Gaussian families additionally carry the reestimation state
//! consumed by the learning module.

use crate::domain::IdMap;
use crate::error::HmmError;
use crate::probability::EmissionProbability;
use hmm_math::MultivariateGaussian;
use ndarray::Array2;
use std::fmt;

/// Probability (or density) of one observation under one state id.
pub trait Emission<O> {
    fn likelihood(&self, obs: &O, state: usize) -> f64;

    /// Sequence-level validation hook, run once before a likelihood matrix
    /// is built. Families that can reject an observation outright (unknown
    /// symbol, wrong dimension) override this.
    fn validate_sequence(&self, _obs: &[O]) -> Result<(), HmmError> {
        Ok(())
    }
}

/// Dense per-sequence likelihood table `l[n, s]`, shape (N, M).
///
/// Built once per sequence and shared by the decoding, forward/backward, and
/// posterior engines. Negative or non-finite entries are configuration
/// errors from the underlying callback.
pub fn likelihood_matrix<O, E: Emission<O> + ?Sized>(
    emission: &E,
    obs: &[O],
    m: usize,
) -> Result<Array2<f64>, HmmError> {
    if obs.is_empty() {
        return Err(HmmError::EmptySequence);
    }
    emission.validate_sequence(obs)?;
    let mut l = Array2::zeros((obs.len(), m));
    for (n, z) in obs.iter().enumerate() {
        for s in 0..m {
            let v = emission.likelihood(z, s);
            if !v.is_finite() || v < 0.0 {
                return Err(HmmError::InvalidProbability {
                    context: "emission likelihood",
                    value: v,
                });
            }
            l[[n, s]] = v;
        }
    }
    Ok(l)
}

/// Generic emission family: a user callback, integrated as-is.
pub struct CallbackEmission<O, S> {
    adapter: EmissionProbability<O, S>,
}

impl<O, S> CallbackEmission<O, S> {
    pub fn new(adapter: EmissionProbability<O, S>) -> Self {
        Self { adapter }
    }
}

impl<O, S> Emission<O> for CallbackEmission<O, S> {
    fn likelihood(&self, obs: &O, state: usize) -> f64 {
        self.adapter.eval_one(obs, state)
    }
}

impl<O, S> fmt::Debug for CallbackEmission<O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEmission").finish_non_exhaustive()
    }
}

/// Discrete categorical emission family.
///
/// Holds the symbol alphabet and a (K, M) table whose column `s` is the
/// distribution over symbols for state `s` (each column sums to 1).
#[derive(Debug, Clone)]
pub struct CategoricalEmission<Y> {
    symbols: IdMap<Y>,
    table: Array2<f64>,
}

impl<Y: PartialEq> CategoricalEmission<Y> {
    /// Build from an alphabet and a raw (K, M) table, normalizing each
    /// column. A column with zero total mass is a configuration error.
    pub fn new(symbols: Vec<Y>, mut table: Array2<f64>) -> Result<Self, HmmError> {
        let k = symbols.len();
        if table.nrows() != k {
            return Err(HmmError::DimensionMismatch {
                expected: k,
                got: table.nrows(),
            });
        }
        for &v in table.iter() {
            if !v.is_finite() || v < 0.0 {
                return Err(HmmError::InvalidProbability {
                    context: "emission table",
                    value: v,
                });
            }
        }
        for (s, mut col) in table.columns_mut().into_iter().enumerate() {
            let sum: f64 = col.sum();
            if sum <= 0.0 {
                return Err(HmmError::DegenerateEmissionColumn { state: s });
            }
            col.mapv_inplace(|v| v / sum);
        }
        Ok(Self {
            symbols: IdMap::new(symbols),
            table,
        })
    }

    /// Number of symbols K.
    pub fn alphabet_len(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &IdMap<Y> {
        &self.symbols
    }

    /// The (K, M) emission table; columns sum to 1.
    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    /// Map a sequence of symbols to dense symbol ids.
    pub fn encode(&self, obs: &[Y]) -> Result<Vec<usize>, HmmError> {
        obs.iter()
            .enumerate()
            .map(|(position, z)| {
                self.symbols
                    .index_of(z)
                    .ok_or(HmmError::UnknownSymbol { position })
            })
            .collect()
    }

    /// Replace the table after a reestimation step. The shape must match;
    /// columns are renormalized.
    pub(crate) fn set_table(&mut self, table: Array2<f64>) -> Result<(), HmmError> {
        debug_assert_eq!(table.dim(), self.table.dim());
        let mut table = table;
        for (s, mut col) in table.columns_mut().into_iter().enumerate() {
            let sum: f64 = col.sum();
            if sum <= 0.0 {
                return Err(HmmError::DegenerateEmissionColumn { state: s });
            }
            col.mapv_inplace(|v| v / sum);
        }
        self.table = table;
        Ok(())
    }
}

impl<Y: PartialEq> Emission<Y> for CategoricalEmission<Y> {
    fn likelihood(&self, obs: &Y, state: usize) -> f64 {
        match self.symbols.index_of(obs) {
            Some(k) => self.table[[k, state]],
            None => 0.0,
        }
    }

    fn validate_sequence(&self, obs: &[Y]) -> Result<(), HmmError> {
        self.encode(obs).map(|_| ())
    }
}

/// Multivariate Gaussian emission family: one component per state.
#[derive(Debug, Clone)]
pub struct GaussianEmission {
    components: Vec<MultivariateGaussian>,
}

impl GaussianEmission {
    /// Build from per-state components. All components must share one
    /// observation dimension.
    pub fn new(components: Vec<MultivariateGaussian>) -> Result<Self, HmmError> {
        let dim = match components.first() {
            Some(c) => c.dim(),
            None => return Err(HmmError::DimensionMismatch { expected: 1, got: 0 }),
        };
        for c in &components {
            if c.dim() != dim {
                return Err(HmmError::DimensionMismatch {
                    expected: dim,
                    got: c.dim(),
                });
            }
        }
        Ok(Self { components })
    }

    /// Observation dimension D.
    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    pub fn components(&self) -> &[MultivariateGaussian] {
        &self.components
    }

    pub(crate) fn set_components(&mut self, components: Vec<MultivariateGaussian>) {
        debug_assert_eq!(components.len(), self.components.len());
        self.components = components;
    }
}

impl<O: AsRef<[f64]>> Emission<O> for GaussianEmission {
    fn likelihood(&self, obs: &O, state: usize) -> f64 {
        self.components[state].pdf(obs.as_ref())
    }

    fn validate_sequence(&self, obs: &[O]) -> Result<(), HmmError> {
        let dim = self.dim();
        for z in obs {
            if z.as_ref().len() != dim {
                return Err(HmmError::DimensionMismatch {
                    expected: dim,
                    got: z.as_ref().len(),
                });
            }
        }
        Ok(())
    }
}
