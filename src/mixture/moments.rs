//! Moment bookkeeping for mixtures.
//!
//! Forward direction: check that sampled children reproduce the parent's
//! mean and variance. Reverse direction: aggregate children back into a
//! parent and recover the dispersion ratio that produced them.

use tracing::error;

use crate::mixture::error::{Invariant, InvariantDiagnostics, MixtureError};
use crate::mixture::types::{ChildWeights, Mixture, MixtureSpec};

/// Below this sum of squared child sds, all variance is treated as between-child.
const MIN_WITHIN_SUM_SQ: f64 = 1e-5;

/// `|actual - expected| <= tolerance`, absolute.
pub(crate) fn within(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}

/// Log an invariant violation and wrap it as an error.
pub(crate) fn violation(diag: InvariantDiagnostics) -> MixtureError {
    error!(
        invariant = ?diag.invariant,
        expected = diag.expected,
        actual = diag.actual,
        tolerance = diag.tolerance,
        varphi2 = diag.varphi2,
        k = diag.weights.len(),
        "mixture invariant violated"
    );
    MixtureError::InvariantViolation(Box::new(diag))
}

/// Weighted first and second moment checks for a candidate mixture.
///
/// Returns the diagnostics of the first failing check, with the weights and
/// child vectors filled in. The variance is taken about the mixture's own
/// mean from centered offsets, so its rounding error scales with `sd^2`
/// rather than `mean^2` and the absolute tolerance holds for large means.
pub(crate) fn moment_violation(
    spec: &MixtureSpec,
    child_means: &[f64],
    child_sds: &[f64],
    tolerance: f64,
) -> Option<InvariantDiagnostics> {
    let p = spec.weights.as_slice();
    let mean = spec.parent_mean;
    let sd = spec.parent_sd;

    let actual_mean: f64 = p.iter().zip(child_means).map(|(w, m)| w * m).sum();
    let offset = actual_mean - mean;
    let centered: f64 = p
        .iter()
        .zip(child_means.iter().zip(child_sds))
        .map(|(w, (m, s))| {
            let d = m - mean;
            w * (d * d + s * s)
        })
        .sum();
    let actual_var = centered - offset * offset;

    let failed = if !within(actual_mean, mean, tolerance) {
        Some((Invariant::MixtureMean, mean, actual_mean))
    } else if !within(actual_var, sd * sd, tolerance) {
        Some((Invariant::MixtureVariance, sd * sd, actual_var))
    } else {
        None
    };

    failed.map(|(invariant, expected, actual)| InvariantDiagnostics {
        invariant: Some(invariant),
        expected,
        actual,
        tolerance,
        weights: p.to_vec(),
        child_means: child_means.to_vec(),
        child_sds: child_sds.to_vec(),
        ..Default::default()
    })
}

/// Check that `mixture` reproduces the parent moments of `spec`.
///
/// Works on any mixture, sampled here or supplied from elsewhere.
pub fn verify_mixture(
    spec: &MixtureSpec,
    mixture: &Mixture,
    tolerance: f64,
) -> Result<(), MixtureError> {
    check_lengths(spec.weights.k(), &mixture.child_means, &mixture.child_sds)?;
    match moment_violation(spec, &mixture.child_means, &mixture.child_sds, tolerance) {
        Some(mut diag) => {
            diag.varphi2 = mixture.varphi2.unwrap_or(f64::NAN);
            Err(violation(diag))
        }
        None => Ok(()),
    }
}

/// Aggregate child distributions into the parent `(mean, sd)`.
///
/// The variance is clamped at zero to absorb rounding.
pub fn combine_children(
    weights: &ChildWeights,
    child_means: &[f64],
    child_sds: &[f64],
) -> Result<(f64, f64), MixtureError> {
    check_lengths(weights.k(), child_means, child_sds)?;

    let mut mean = 0.0;
    let mut second = 0.0;
    for ((w, m), s) in weights.as_slice().iter().zip(child_means).zip(child_sds) {
        mean += w * m;
        second += w * (m * m + s * s);
    }

    let variance = (second - mean * mean).max(0.0);
    Ok((mean, variance.sqrt()))
}

/// Recover the dispersion ratio from a parent sd and its children's sds.
///
/// `varphi2 = 1 - sum_i p_i sigma_i^2 / sd^2`. Returns exactly 1 when the
/// parent sd is 0 or the unweighted sum of squared child sds is below 1e-5.
/// That cutoff is absolute, so children with genuinely small spreads (a
/// single child with sd = 1e-3, say) also report 1 rather than the ratio.
pub fn recover_varphi2(
    parent_sd: f64,
    weights: &ChildWeights,
    child_sds: &[f64],
) -> Result<f64, MixtureError> {
    if !parent_sd.is_finite() || parent_sd < 0.0 {
        return Err(MixtureError::invalid(
            "parent_sd",
            format!("must be non-negative and finite, got {}", parent_sd),
        ));
    }
    if child_sds.len() != weights.k() {
        return Err(MixtureError::invalid(
            "child_sds",
            format!("expected {} values, got {}", weights.k(), child_sds.len()),
        ));
    }

    let sum_sq: f64 = child_sds.iter().map(|s| s * s).sum();
    if sum_sq < MIN_WITHIN_SUM_SQ || parent_sd == 0.0 {
        return Ok(1.0);
    }

    let within: f64 = weights
        .as_slice()
        .iter()
        .zip(child_sds)
        .map(|(w, s)| w * s * s)
        .sum();
    Ok(1.0 - within / (parent_sd * parent_sd))
}

fn check_lengths(k: usize, child_means: &[f64], child_sds: &[f64]) -> Result<(), MixtureError> {
    if child_means.len() != k {
        return Err(MixtureError::invalid(
            "child_means",
            format!("expected {} values, got {}", k, child_means.len()),
        ));
    }
    if child_sds.len() != k {
        return Err(MixtureError::invalid(
            "child_sds",
            format!("expected {} values, got {}", k, child_sds.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_is_absolute() {
        assert!(within(1.0 + 5e-9, 1.0, 1e-8));
        assert!(!within(1.0 + 5e-8, 1.0, 1e-8));
        assert!(!within(1e6 + 1e-3, 1e6, 1e-8));
    }

    #[test]
    fn test_combine_two_point_mixture() {
        let weights = ChildWeights::uniform(2).unwrap();
        let (mean, sd) = combine_children(&weights, &[-1.0, 1.0], &[0.0, 0.0]).unwrap();
        assert!(mean.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_combine_weighted() {
        let weights = ChildWeights::new(vec![0.25, 0.75]).unwrap();
        let (mean, sd) = combine_children(&weights, &[4.0, 0.0], &[2.0, 2.0]).unwrap();
        // mean = 1, second moment = 0.25 * 20 + 0.75 * 4 = 8
        assert!((mean - 1.0).abs() < 1e-12);
        assert!((sd - 7f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_combine_length_mismatch() {
        let weights = ChildWeights::uniform(3).unwrap();
        match combine_children(&weights, &[1.0, 2.0], &[1.0, 1.0, 1.0]) {
            Err(MixtureError::InvalidInput { field, .. }) => assert_eq!(field, "child_means"),
            other => panic!("expected child_means error, got {:?}", other),
        }
        match combine_children(&weights, &[1.0, 2.0, 3.0], &[1.0]) {
            Err(MixtureError::InvalidInput { field, .. }) => assert_eq!(field, "child_sds"),
            other => panic!("expected child_sds error, got {:?}", other),
        }
    }

    #[test]
    fn test_recover_varphi2() {
        let weights = ChildWeights::uniform(4).unwrap();
        // Average child variance 0.25 of parent variance 1.
        let v = recover_varphi2(1.0, &weights, &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert!((v - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_recover_varphi2_no_child_spread() {
        let weights = ChildWeights::uniform(3).unwrap();
        assert_eq!(recover_varphi2(10.0, &weights, &[0.0, 1e-4, 0.0]).unwrap(), 1.0);
        assert_eq!(recover_varphi2(0.0, &weights, &[1.0, 1.0, 1.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_recover_varphi2_small_scale_reports_one() {
        let single = ChildWeights::uniform(1).unwrap();
        assert_eq!(recover_varphi2(3.0, &single, &[3.0]).unwrap(), 0.0);
        assert_eq!(recover_varphi2(1e-3, &single, &[1e-3]).unwrap(), 1.0);
    }

    #[test]
    fn test_recover_varphi2_rejects_bad_input() {
        let weights = ChildWeights::uniform(2).unwrap();
        assert!(recover_varphi2(-1.0, &weights, &[1.0, 1.0]).is_err());
        assert!(recover_varphi2(1.0, &weights, &[1.0]).is_err());
    }

    #[test]
    fn test_verify_mixture_accepts_exact() {
        let spec = MixtureSpec::new(10.0, 2.0, 2).unwrap();
        // Means 8 and 12 give between-child variance 4 = parent variance.
        let mixture = Mixture {
            child_means: vec![8.0, 12.0],
            child_sds: vec![0.0, 0.0],
            varphi2: Some(1.0),
        };
        assert!(verify_mixture(&spec, &mixture, 1e-8).is_ok());
    }

    #[test]
    fn test_verify_mixture_reports_mean() {
        let spec = MixtureSpec::new(10.0, 2.0, 2).unwrap();
        let mixture = Mixture {
            child_means: vec![9.0, 12.0],
            child_sds: vec![0.0, 0.0],
            varphi2: None,
        };
        let err = verify_mixture(&spec, &mixture, 1e-8).unwrap_err();
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.invariant, Some(Invariant::MixtureMean));
        assert_eq!(diag.expected, 10.0);
        assert!((diag.actual - 10.5).abs() < 1e-12);
        assert_eq!(diag.child_means, vec![9.0, 12.0]);
    }

    #[test]
    fn test_verify_mixture_reports_variance() {
        let spec = MixtureSpec::new(10.0, 2.0, 2).unwrap();
        let mixture = Mixture {
            child_means: vec![8.0, 12.0],
            child_sds: vec![1.0, 1.0],
            varphi2: Some(0.5),
        };
        let err = verify_mixture(&spec, &mixture, 1e-8).unwrap_err();
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.invariant, Some(Invariant::MixtureVariance));
        assert!((diag.actual - 5.0).abs() < 1e-12);
        assert_eq!(diag.varphi2, 0.5);
    }

    #[test]
    fn test_verify_mixture_small_variance_error_at_large_mean() {
        // Variance 1.0049 instead of 1 around a mean of 1000.
        let spec = MixtureSpec::new(1000.0, 1.0, 2).unwrap();
        let mixture = Mixture {
            child_means: vec![999.0, 1001.0],
            child_sds: vec![0.07, 0.07],
            varphi2: None,
        };
        let err = verify_mixture(&spec, &mixture, 1e-8).unwrap_err();
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.invariant, Some(Invariant::MixtureVariance));
        assert!((diag.actual - 1.0049).abs() < 1e-9);
        assert_eq!(diag.tolerance, 1e-8);
    }

    #[test]
    fn test_verify_mixture_exact_at_large_mean() {
        let spec = MixtureSpec::new(1e6, 3.0, 2).unwrap();
        let mixture = Mixture {
            child_means: vec![1e6 - 2.0, 1e6 + 2.0],
            child_sds: vec![5f64.sqrt(), 5f64.sqrt()],
            varphi2: Some(4.0 / 9.0),
        };
        assert!(verify_mixture(&spec, &mixture, 1e-8).is_ok());
    }
}
