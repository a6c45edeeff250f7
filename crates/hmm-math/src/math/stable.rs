//! Numerically stable primitives for log-domain recursions.

/// Natural log that maps zero (and any non-positive input) to negative
/// infinity instead of NaN.
///
/// Log-domain recursions treat a zero-probability entry as an unreachable
/// branch, not an arithmetic error.
pub fn ln_or_neg_inf(x: f64) -> f64 {
    if x > 0.0 {
        x.ln()
    } else {
        f64::NEG_INFINITY
    }
}

/// Index of the maximum entry, resolving ties to the lowest index.
///
/// Matches dense-array argmax semantics: a later entry replaces the running
/// best only when it is strictly greater. Returns 0 for an empty slice.
pub fn argmax_first(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs; NaN inputs
/// propagate to a NaN result.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}
