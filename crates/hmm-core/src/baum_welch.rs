//! Baum-Welch (EM) reestimation for the discrete and Gaussian families.
//!
//! One iteration is one full batch pass: every sequence contributes
//! forward/backward posteriors to a set of numerator/denominator
//! accumulators, and only after the whole batch has been accumulated are
//! the transition matrix, emission parameters, and initial distribution
//! replaced together. No parameter mutates mid-batch.
//!
//! Sequences of very different likelihoods are combined on a common scale:
//! each sequence's statistics are weighted by
//! `exp(max_log_prob - log_prob_i)` before summation. The weight is applied
//! symmetrically to transition and emission accumulators.

use crate::backward::backward;
use crate::emission::{likelihood_matrix, CategoricalEmission, GaussianEmission};
use crate::error::HmmError;
use crate::forward::forward;
use crate::posterior::{posteriors, Posteriors};
use hmm_math::MultivariateGaussian;
use ndarray::{Array1, Array2};
use tracing::debug;

/// Transition and initial-distribution statistics from one sequence.
struct SequenceStats {
    /// Sum over time of ksi slices, shape (M, M).
    trans_numer: Array2<f64>,
    /// Sum over time of gamma excluding the final step, length M.
    trans_denom: Array1<f64>,
    /// gamma[0, :].
    initial: Array1<f64>,
    log_likelihood: f64,
}

fn sequence_stats(post: &Posteriors, log_likelihood: f64) -> SequenceStats {
    let (n_minus_1, m, _) = post.ksi.dim();
    let mut trans_numer = Array2::zeros((m, m));
    let mut trans_denom = Array1::zeros(m);
    for n in 0..n_minus_1 {
        for s in 0..m {
            trans_denom[s] += post.gamma[[n, s]];
            for sp in 0..m {
                trans_numer[[s, sp]] += post.ksi[[n, s, sp]];
            }
        }
    }
    SequenceStats {
        trans_numer,
        trans_denom,
        initial: post.gamma.row(0).to_owned(),
        log_likelihood,
    }
}

/// Batch accumulator for the shared (transition, initial) update.
///
/// `merge` is associative, so per-sequence statistics could be folded in
/// any grouping; parameters are only touched by `apply`, which is the
/// batch barrier.
struct TransitionAccumulator {
    numer: Array2<f64>,
    denom: Array1<f64>,
    initial_sum: Array1<f64>,
    sequences: usize,
}

impl TransitionAccumulator {
    fn new(m: usize) -> Self {
        Self {
            numer: Array2::zeros((m, m)),
            denom: Array1::zeros(m),
            initial_sum: Array1::zeros(m),
            sequences: 0,
        }
    }

    fn merge(&mut self, stats: &SequenceStats, weight: f64) {
        self.numer.scaled_add(weight, &stats.trans_numer);
        self.denom.scaled_add(weight, &stats.trans_denom);
        self.initial_sum += &stats.initial;
        self.sequences += 1;
    }

    /// Replace the transition matrix and initial distribution from the
    /// accumulated batch. A state with zero transition mass (only seen at
    /// final positions) keeps its previous row.
    fn apply(&self, transition: &mut Array2<f64>, initial: &mut Array1<f64>) {
        let m = self.denom.len();
        for s in 0..m {
            if self.denom[s] <= 0.0 {
                continue;
            }
            let mut row_sum = 0.0;
            for sp in 0..m {
                let v = self.numer[[s, sp]] / self.denom[s];
                transition[[s, sp]] = v;
                row_sum += v;
            }
            // Exact up to floating point already; renormalize anyway so the
            // row-stochastic invariant survives accumulation error.
            for sp in 0..m {
                transition[[s, sp]] /= row_sum;
            }
        }
        let count = self.sequences as f64;
        for s in 0..m {
            initial[s] = self.initial_sum[s] / count;
        }
    }
}

/// Likelihood table for an encoded symbol sequence: row n is the table row
/// of symbol id `ids[n]`.
fn encoded_likelihoods(table: &Array2<f64>, ids: &[usize], m: usize) -> Array2<f64> {
    let mut l = Array2::zeros((ids.len(), m));
    for (n, &k) in ids.iter().enumerate() {
        for s in 0..m {
            l[[n, s]] = table[[k, s]];
        }
    }
    l
}

/// Fixed-iteration EM for the discrete-categorical family.
pub(crate) fn reestimate_discrete<Y: PartialEq>(
    transition: &mut Array2<f64>,
    initial: &mut Array1<f64>,
    emission: &mut CategoricalEmission<Y>,
    sequences: &[Vec<Y>],
    iterations: usize,
) -> Result<(), HmmError> {
    if sequences.is_empty() {
        return Err(HmmError::EmptySequence);
    }
    let m = transition.nrows();
    let k = emission.alphabet_len();
    let encoded: Vec<Vec<usize>> = sequences
        .iter()
        .map(|seq| {
            if seq.is_empty() {
                Err(HmmError::EmptySequence)
            } else {
                emission.encode(seq)
            }
        })
        .collect::<Result<_, _>>()?;

    for iteration in 0..iterations {
        let mut per_seq = Vec::with_capacity(encoded.len());
        let mut max_ll = f64::NEG_INFINITY;
        let mut total_ll = 0.0;

        for ids in &encoded {
            let l = encoded_likelihoods(emission.table(), ids, m);
            let fwd = forward(transition, initial, &l)?;
            let bwd = backward(transition, &l, &fwd);
            let post = posteriors(transition, &l, &fwd, &bwd)?;

            let mut emis_numer = Array2::zeros((k, m));
            let mut emis_denom = Array1::zeros(m);
            for (n, &kid) in ids.iter().enumerate() {
                for s in 0..m {
                    let g = post.gamma[[n, s]];
                    emis_numer[[kid, s]] += g;
                    emis_denom[s] += g;
                }
            }

            let stats = sequence_stats(&post, fwd.log_likelihood);
            max_ll = max_ll.max(stats.log_likelihood);
            total_ll += stats.log_likelihood;
            per_seq.push((stats, emis_numer, emis_denom));
        }

        let mut acc = TransitionAccumulator::new(m);
        let mut emis_numer = Array2::zeros((k, m));
        let mut emis_denom = Array1::zeros(m);
        for (stats, numer, denom) in &per_seq {
            let weight = (max_ll - stats.log_likelihood).exp();
            acc.merge(stats, weight);
            emis_numer.scaled_add(weight, numer);
            emis_denom.scaled_add(weight, denom);
        }

        // Batch barrier: every parameter replaced together.
        acc.apply(transition, initial);
        let mut table = emission.table().clone();
        for s in 0..m {
            if emis_denom[s] <= 0.0 {
                continue;
            }
            for kid in 0..k {
                table[[kid, s]] = emis_numer[[kid, s]] / emis_denom[s];
            }
        }
        emission.set_table(table)?;

        debug!(iteration, log_likelihood = total_ll, "reestimation iteration");
    }
    Ok(())
}

/// Fixed-iteration EM for the multivariate-Gaussian family.
///
/// Means are finalized across the whole batch before any covariance is
/// computed; covariances use the newly computed means.
pub(crate) fn reestimate_gaussian<O: AsRef<[f64]>>(
    transition: &mut Array2<f64>,
    initial: &mut Array1<f64>,
    emission: &mut GaussianEmission,
    sequences: &[Vec<O>],
    iterations: usize,
) -> Result<(), HmmError> {
    if sequences.is_empty() || sequences.iter().any(|seq| seq.is_empty()) {
        return Err(HmmError::EmptySequence);
    }
    let m = transition.nrows();
    let d = emission.dim();

    for iteration in 0..iterations {
        let mut gammas = Vec::with_capacity(sequences.len());
        let mut seq_stats = Vec::with_capacity(sequences.len());
        let mut max_ll = f64::NEG_INFINITY;
        let mut total_ll = 0.0;

        for seq in sequences {
            let l = likelihood_matrix(emission, seq, m)?;
            let fwd = forward(transition, initial, &l)?;
            let bwd = backward(transition, &l, &fwd);
            let post = posteriors(transition, &l, &fwd, &bwd)?;
            let stats = sequence_stats(&post, fwd.log_likelihood);
            max_ll = max_ll.max(stats.log_likelihood);
            total_ll += stats.log_likelihood;
            seq_stats.push(stats);
            gammas.push(post.gamma);
        }

        let mut acc = TransitionAccumulator::new(m);
        for stats in &seq_stats {
            acc.merge(stats, (max_ll - stats.log_likelihood).exp());
        }

        // First pass: occupancy-weighted means over the whole batch.
        let mut mean_numer = Array2::<f64>::zeros((m, d));
        let mut occupancy = Array1::<f64>::zeros(m);
        for (seq, gamma) in sequences.iter().zip(&gammas) {
            for (n, z) in seq.iter().enumerate() {
                let x = z.as_ref();
                for s in 0..m {
                    let g = gamma[[n, s]];
                    occupancy[s] += g;
                    for j in 0..d {
                        mean_numer[[s, j]] += g * x[j];
                    }
                }
            }
        }
        for s in 0..m {
            if occupancy[s] <= 0.0 {
                return Err(HmmError::ZeroOccupancy { state: s });
            }
        }
        let means: Vec<Array1<f64>> = (0..m)
            .map(|s| {
                Array1::from_iter((0..d).map(|j| mean_numer[[s, j]] / occupancy[s]))
            })
            .collect();

        // Second pass: covariances around the new means.
        let mut cov_numer = vec![Array2::<f64>::zeros((d, d)); m];
        for (seq, gamma) in sequences.iter().zip(&gammas) {
            for (n, z) in seq.iter().enumerate() {
                let x = z.as_ref();
                for s in 0..m {
                    let g = gamma[[n, s]];
                    for i in 0..d {
                        let di = x[i] - means[s][i];
                        for j in 0..d {
                            let dj = x[j] - means[s][j];
                            cov_numer[s][[i, j]] += g * di * dj;
                        }
                    }
                }
            }
        }
        let components = means
            .into_iter()
            .enumerate()
            .map(|(s, mean)| {
                let cov = cov_numer[s].mapv(|v| v / occupancy[s]);
                MultivariateGaussian::new(mean, cov)
                    .ok_or(HmmError::InvalidCovariance { state: s })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Batch barrier: every parameter replaced together.
        acc.apply(transition, initial);
        emission.set_components(components);

        debug!(iteration, log_likelihood = total_ll, "reestimation iteration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_emission() -> CategoricalEmission<char> {
        let table = array![[0.8, 0.3], [0.2, 0.7]];
        CategoricalEmission::new(vec!['a', 'b'], table).unwrap()
    }

    #[test]
    fn discrete_iteration_keeps_rows_stochastic() {
        let mut p = array![[0.6, 0.4], [0.3, 0.7]];
        let mut pi = array![0.5, 0.5];
        let mut e = toy_emission();
        let seqs = vec![
            vec!['a', 'a', 'b', 'a', 'b', 'b', 'a'],
            vec!['b', 'b', 'a', 'b'],
        ];
        reestimate_discrete(&mut p, &mut pi, &mut e, &seqs, 3).unwrap();
        for s in 0..2 {
            let row: f64 = p.row(s).sum();
            assert!((row - 1.0).abs() < 1e-9);
            let col: f64 = e.table().column(s).sum();
            assert!((col - 1.0).abs() < 1e-9);
        }
        let pi_sum: f64 = pi.sum();
        assert!((pi_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_sequence_em_is_monotone_in_log_likelihood() {
        let mut p = array![[0.6, 0.4], [0.3, 0.7]];
        let mut pi = array![0.5, 0.5];
        let mut e = toy_emission();
        let seq = vec!['a', 'a', 'b', 'a', 'b', 'b', 'b', 'a', 'a', 'b'];
        let seqs = vec![seq.clone()];

        let mut previous = f64::NEG_INFINITY;
        for _ in 0..8 {
            reestimate_discrete(&mut p, &mut pi, &mut e, &seqs, 1).unwrap();
            let ids = e.encode(&seq).unwrap();
            let l = encoded_likelihoods(e.table(), &ids, 2);
            let ll = forward(&p, &pi, &l).unwrap().log_likelihood;
            assert!(
                ll >= previous - 1e-9,
                "log-likelihood decreased: {previous} -> {ll}"
            );
            previous = ll;
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut p = array![[0.6, 0.4], [0.3, 0.7]];
        let mut pi = array![0.5, 0.5];
        let mut e = toy_emission();
        let seqs: Vec<Vec<char>> = vec![];
        assert_eq!(
            reestimate_discrete(&mut p, &mut pi, &mut e, &seqs, 1).unwrap_err(),
            HmmError::EmptySequence
        );
    }

    #[test]
    fn unknown_symbol_in_batch_is_rejected_before_any_update() {
        let mut p = array![[0.6, 0.4], [0.3, 0.7]];
        let original = p.clone();
        let mut pi = array![0.5, 0.5];
        let mut e = toy_emission();
        let seqs = vec![vec!['a', 'x']];
        assert_eq!(
            reestimate_discrete(&mut p, &mut pi, &mut e, &seqs, 1).unwrap_err(),
            HmmError::UnknownSymbol { position: 1 }
        );
        assert_eq!(p, original);
    }

    #[test]
    fn gaussian_em_pulls_means_toward_clusters() {
        let mut p = array![[0.8, 0.2], [0.2, 0.8]];
        let mut pi = array![0.5, 0.5];
        let mut e = GaussianEmission::new(vec![
            MultivariateGaussian::new(array![-0.5], array![[1.0]]).unwrap(),
            MultivariateGaussian::new(array![0.5], array![[1.0]]).unwrap(),
        ])
        .unwrap();

        // Two well-separated clusters around -2 and +2 with dwell runs.
        let seq: Vec<Vec<f64>> = vec![
            vec![-2.1], vec![-1.9], vec![-2.0], vec![-2.2], vec![-1.8],
            vec![2.1], vec![1.9], vec![2.0], vec![2.2], vec![1.8],
            vec![-2.0], vec![-2.1], vec![1.95], vec![2.05], vec![-1.95],
        ];
        reestimate_gaussian(&mut p, &mut pi, &mut e, &[seq], 20).unwrap();

        let m0 = e.components()[0].mean()[0];
        let m1 = e.components()[1].mean()[0];
        assert!(m0 < -1.5, "low-state mean drifted to {m0}");
        assert!(m1 > 1.5, "high-state mean drifted to {m1}");
    }
}
