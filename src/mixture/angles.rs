//! Angle-parameterized samplers for the normalized mixture vectors.
//!
//! Both vectors are points on a sphere written in hyperspherical
//! coordinates, so any choice of angles yields the required sum of squares
//! by construction:
//!
//! - **Gamma** (child-mean offsets) lives on the `(k-2)`-sphere of radius
//!   `sqrt(varphi2)` spanned by the orthonormal basis, hence it is also
//!   orthogonal to the square-root weight vector.
//! - **Eta** (child-sd magnitudes) lives on the positive orthant of the
//!   `(k-1)`-sphere of radius `sqrt(1 - varphi2)`.
//!
//! Every sampled vector is checked against its postcondition before it is
//! returned.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use rand::Rng;

use crate::mixture::basis::OrthonormalBasis;
use crate::mixture::config::DEFAULT_TOLERANCE;
use crate::mixture::error::{Invariant, InvariantDiagnostics, MixtureError};
use crate::mixture::moments::{violation, within};

/// Map hyperspherical angles to Cartesian coordinates.
///
/// `n` angles produce `n + 1` coordinates:
///
/// ```text
/// x_0 = r cos(a_0)
/// x_i = r sin(a_0) ... sin(a_{i-1}) cos(a_i)
/// x_n = r sin(a_0) ... sin(a_{n-1})
/// ```
pub fn hyperspherical_to_cartesian(angles: &[f64], radius: f64) -> Vec<f64> {
    let mut coords = Vec::with_capacity(angles.len() + 1);
    let mut sin_prod = radius;
    for &a in angles {
        coords.push(sin_prod * a.cos());
        sin_prod *= a.sin();
    }
    coords.push(sin_prod);
    coords
}

pub(crate) fn check_varphi2(varphi2: f64) -> Result<(), MixtureError> {
    if !(0.0..=1.0).contains(&varphi2) {
        return Err(MixtureError::invalid(
            "varphi2",
            format!("must lie in [0, 1], got {}", varphi2),
        ));
    }
    Ok(())
}

/// Number of angles a gamma draw uses for `k` children.
fn gamma_angle_count(k: usize) -> usize {
    k.saturating_sub(2)
}

/// Draw the gamma angles: `k - 3` from `[0, pi)` and a final one from `[0, 2 pi)`.
///
/// Returns no angles for `k <= 2`.
pub fn draw_varpi<R: Rng + ?Sized>(k: usize, rng: &mut R) -> Vec<f64> {
    let n = gamma_angle_count(k);
    if n == 0 {
        return Vec::new();
    }
    let mut varpi: Vec<f64> = (0..n - 1).map(|_| rng.gen_range(0.0..PI)).collect();
    varpi.push(rng.gen_range(0.0..TAU));
    varpi
}

/// Draw the eta angles: `k - 1` from `[0, pi/2]`.
pub fn draw_xi<R: Rng + ?Sized>(k: usize, rng: &mut R) -> Vec<f64> {
    (0..k.saturating_sub(1))
        .map(|_| rng.gen_range(0.0..=FRAC_PI_2))
        .collect()
}

/// Normalized child-mean offsets.
///
/// Orthogonal to the square-root weights (zero-sum for uniform weights),
/// with sum of squares `varphi2`.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaVector {
    /// Angles the vector was built from (empty for `k = 2`).
    pub angles: Vec<f64>,
    /// The `k` offsets.
    pub values: Vec<f64>,
}

impl GammaVector {
    /// Build gamma from explicit angles.
    ///
    /// For `k = 2` the basis has a single row and no angles are taken: gamma
    /// is that row scaled by `sqrt(varphi2)`. For `k >= 3`, `angles` must
    /// hold `k - 2` values.
    pub fn from_angles(
        basis: &OrthonormalBasis,
        angles: &[f64],
        varphi2: f64,
    ) -> Result<Self, MixtureError> {
        check_varphi2(varphi2)?;
        let expected = gamma_angle_count(basis.k());
        if angles.len() != expected {
            return Err(MixtureError::invalid(
                "varpi",
                format!(
                    "{} children need {} angles, got {}",
                    basis.k(),
                    expected,
                    angles.len()
                ),
            ));
        }

        let radius = varphi2.sqrt();
        let values = if basis.k() == 2 {
            basis.row(0).iter().map(|x| x * radius).collect()
        } else {
            let coeffs = hyperspherical_to_cartesian(angles, radius);
            basis.combine(&coeffs)
        };

        Ok(Self {
            angles: angles.to_vec(),
            values,
        })
    }

    /// Sample gamma on the given basis and verify it.
    pub fn sample<R: Rng + ?Sized>(
        basis: &OrthonormalBasis,
        varphi2: f64,
        tolerance: f64,
        rng: &mut R,
    ) -> Result<Self, MixtureError> {
        check_varphi2(varphi2)?;
        let varpi = draw_varpi(basis.k(), rng);
        let gamma = Self::from_angles(basis, &varpi, varphi2)?;
        match gamma.violation(basis.weights(), varphi2, tolerance) {
            Some(diag) => Err(violation(diag)),
            None => Ok(gamma),
        }
    }

    /// Check the zero-sum and norm postconditions.
    pub fn verify(&self, weights: &[f64], varphi2: f64, tolerance: f64) -> Result<(), MixtureError> {
        match self.violation(weights, varphi2, tolerance) {
            Some(diag) => Err(violation(diag)),
            None => Ok(()),
        }
    }

    pub(crate) fn violation(
        &self,
        weights: &[f64],
        varphi2: f64,
        tolerance: f64,
    ) -> Option<InvariantDiagnostics> {
        let projection: f64 = weights
            .iter()
            .zip(&self.values)
            .map(|(w, g)| w.sqrt() * g)
            .sum();
        let sum_sq: f64 = self.values.iter().map(|g| g * g).sum();

        let failed = if !within(projection, 0.0, tolerance) {
            Some((Invariant::GammaZeroSum, 0.0, projection))
        } else if !within(sum_sq, varphi2, tolerance) {
            Some((Invariant::GammaNorm, varphi2, sum_sq))
        } else {
            None
        };

        failed.map(|(invariant, expected, actual)| InvariantDiagnostics {
            invariant: Some(invariant),
            expected,
            actual,
            tolerance,
            weights: weights.to_vec(),
            varphi2,
            varpi: self.angles.clone(),
            gamma: self.values.clone(),
            ..Default::default()
        })
    }
}

/// Normalized child-sd magnitudes: non-negative, sum of squares `1 - varphi2`.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaVector {
    /// Angles the vector was built from (`k - 1` values).
    pub angles: Vec<f64>,
    /// The `k` magnitudes.
    pub values: Vec<f64>,
}

impl EtaVector {
    /// Build eta from `k - 1` angles in `[0, pi/2]`.
    pub fn from_angles(angles: &[f64], varphi2: f64) -> Result<Self, MixtureError> {
        check_varphi2(varphi2)?;
        if let Some(a) = angles.iter().find(|a| !(0.0..=FRAC_PI_2).contains(*a)) {
            return Err(MixtureError::invalid(
                "xi",
                format!("angles must lie in [0, pi/2], got {}", a),
            ));
        }
        // Angles in the first quadrant keep every factor non-negative.
        let values = hyperspherical_to_cartesian(angles, (1.0 - varphi2).sqrt());
        Ok(Self {
            angles: angles.to_vec(),
            values,
        })
    }

    /// Sample eta for `k` children and verify it.
    pub fn sample<R: Rng + ?Sized>(
        k: usize,
        varphi2: f64,
        tolerance: f64,
        rng: &mut R,
    ) -> Result<Self, MixtureError> {
        if k == 0 {
            return Err(MixtureError::invalid("k", "child count must be at least 1, got 0"));
        }
        check_varphi2(varphi2)?;
        let xi = draw_xi(k, rng);
        let eta = Self::from_angles(&xi, varphi2)?;
        match eta.violation(varphi2, tolerance) {
            Some(diag) => Err(violation(diag)),
            None => Ok(eta),
        }
    }

    /// Check the norm postcondition.
    pub fn verify(&self, varphi2: f64, tolerance: f64) -> Result<(), MixtureError> {
        match self.violation(varphi2, tolerance) {
            Some(diag) => Err(violation(diag)),
            None => Ok(()),
        }
    }

    pub(crate) fn violation(&self, varphi2: f64, tolerance: f64) -> Option<InvariantDiagnostics> {
        let sum_sq: f64 = self.values.iter().map(|e| e * e).sum();
        let expected = 1.0 - varphi2;
        if within(sum_sq, expected, tolerance) {
            return None;
        }
        Some(InvariantDiagnostics {
            invariant: Some(Invariant::EtaNorm),
            expected,
            actual: sum_sq,
            tolerance,
            varphi2,
            xi: self.angles.clone(),
            eta: self.values.clone(),
            ..Default::default()
        })
    }
}

/// Sample a gamma vector for `k >= 2` equally weighted children.
pub fn sample_gamma<R: Rng + ?Sized>(
    k: usize,
    varphi2: f64,
    rng: &mut R,
) -> Result<GammaVector, MixtureError> {
    let basis = OrthonormalBasis::uniform(k)?;
    GammaVector::sample(&basis, varphi2, DEFAULT_TOLERANCE, rng)
}

/// Sample an eta vector for `k >= 1` children.
pub fn sample_eta<R: Rng + ?Sized>(
    k: usize,
    varphi2: f64,
    rng: &mut R,
) -> Result<EtaVector, MixtureError> {
    EtaVector::sample(k, varphi2, DEFAULT_TOLERANCE, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::mixture::types::ChildWeights;

    const EPS: f64 = 1e-8;

    #[test]
    fn test_hyperspherical_unit_norm() {
        let coords = hyperspherical_to_cartesian(&[0.3, 1.2, 2.9, 4.0], 2.0);
        assert_eq!(coords.len(), 5);
        let sum_sq: f64 = coords.iter().map(|x| x * x).sum();
        assert!((sum_sq - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_hyperspherical_no_angles() {
        assert_eq!(hyperspherical_to_cartesian(&[], 0.7), vec![0.7]);
    }

    #[test]
    fn test_angle_counts_and_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw_varpi(2, &mut rng).is_empty());
        assert_eq!(draw_varpi(3, &mut rng).len(), 1);

        for _ in 0..200 {
            let varpi = draw_varpi(8, &mut rng);
            assert_eq!(varpi.len(), 6);
            assert!(varpi[..5].iter().all(|a| (0.0..PI).contains(a)));
            assert!((0.0..TAU).contains(&varpi[5]));

            let xi = draw_xi(8, &mut rng);
            assert_eq!(xi.len(), 7);
            assert!(xi.iter().all(|a| (0.0..=FRAC_PI_2).contains(a)));
        }
    }

    #[test]
    fn test_gamma_fixed_angles_k5() {
        let basis = OrthonormalBasis::uniform(5).unwrap();
        let varpi = [1.12674078, 1.05344725, 3.44247279];
        let varphi2 = 0.6819057940917935;

        let gamma = GammaVector::from_angles(&basis, &varpi, varphi2).unwrap();
        let expected = [-0.17977888, 0.32192417, 0.52276042, -0.49311077, -0.17179493];
        for (g, e) in gamma.values.iter().zip(expected) {
            assert!((g - e).abs() < 1e-7, "{:?}", gamma.values);
        }
        assert!(gamma.verify(basis.weights(), varphi2, EPS).is_ok());
    }

    #[test]
    fn test_gamma_k2_direct_assignment() {
        let mut rng = StdRng::seed_from_u64(2);
        let gamma = sample_gamma(2, 0.5, &mut rng).unwrap();
        assert!(gamma.angles.is_empty());
        assert!((gamma.values[0] + 0.5).abs() < 1e-12);
        assert!((gamma.values[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gamma_wrong_angle_count() {
        let basis = OrthonormalBasis::uniform(5).unwrap();
        match GammaVector::from_angles(&basis, &[0.1, 0.2], 0.5) {
            Err(MixtureError::InvalidInput { field, .. }) => assert_eq!(field, "varpi"),
            other => panic!("expected varpi error, got {:?}", other),
        }
    }

    #[test]
    fn test_gamma_properties_sweep() {
        let mut rng = StdRng::seed_from_u64(3);
        for k in 2..=20 {
            for _ in 0..50 {
                let varphi2: f64 = rng.gen_range(0.0..1.0);
                let gamma = sample_gamma(k, varphi2, &mut rng).unwrap();
                assert_eq!(gamma.values.len(), k);

                let sum: f64 = gamma.values.iter().sum();
                let sum_sq: f64 = gamma.values.iter().map(|g| g * g).sum();
                assert!(sum.abs() < EPS, "k={} sum={}", k, sum);
                assert!((sum_sq - varphi2).abs() < EPS, "k={} sum_sq={}", k, sum_sq);
            }
        }
    }

    #[test]
    fn test_eta_properties_sweep() {
        let mut rng = StdRng::seed_from_u64(4);
        for k in 2..=20 {
            for _ in 0..50 {
                let varphi2: f64 = rng.gen_range(0.0..1.0);
                let eta = sample_eta(k, varphi2, &mut rng).unwrap();
                assert_eq!(eta.values.len(), k);
                assert_eq!(eta.angles.len(), k - 1);
                assert!(eta.values.iter().all(|e| *e >= 0.0));

                let sum_sq: f64 = eta.values.iter().map(|e| e * e).sum();
                assert!((sum_sq - (1.0 - varphi2)).abs() < EPS, "k={} sum_sq={}", k, sum_sq);
            }
        }
    }

    #[test]
    fn test_weighted_gamma_orthogonal_to_sqrt_weights() {
        let mut rng = StdRng::seed_from_u64(5);
        let weights = ChildWeights::new(vec![0.1, 0.15, 0.25, 0.5]).unwrap();
        let basis = OrthonormalBasis::weighted(&weights).unwrap();

        for _ in 0..100 {
            let gamma = GammaVector::sample(&basis, 0.4, EPS, &mut rng).unwrap();
            let projection: f64 = weights
                .sqrt()
                .iter()
                .zip(&gamma.values)
                .map(|(s, g)| s * g)
                .sum();
            assert!(projection.abs() < EPS);
        }
    }

    #[test]
    fn test_varphi2_out_of_range() {
        let mut rng = StdRng::seed_from_u64(6);
        for bad in [-0.1, 1.1, f64::NAN] {
            match sample_eta(3, bad, &mut rng) {
                Err(MixtureError::InvalidInput { field, .. }) => assert_eq!(field, "varphi2"),
                other => panic!("varphi2={} should fail, got {:?}", bad, other),
            }
            assert!(sample_gamma(3, bad, &mut rng).is_err());
        }
    }

    #[test]
    fn test_eta_rejects_out_of_quadrant_angles() {
        match EtaVector::from_angles(&[0.2, 2.0], 0.5) {
            Err(MixtureError::InvalidInput { field, .. }) => assert_eq!(field, "xi"),
            other => panic!("expected xi error, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_gamma_reports_violation() {
        let basis = OrthonormalBasis::uniform(4).unwrap();
        let mut gamma = GammaVector::from_angles(&basis, &[0.4, 1.3], 0.3).unwrap();
        gamma.values[0] += 0.1;

        let err = gamma.verify(basis.weights(), 0.3, EPS).unwrap_err();
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.invariant, Some(Invariant::GammaZeroSum));
        assert_eq!(diag.varpi, vec![0.4, 1.3]);
        assert_eq!(diag.gamma, gamma.values);
    }

    #[test]
    fn test_tampered_eta_reports_violation() {
        let mut eta = EtaVector::from_angles(&[0.4, 1.3], 0.3).unwrap();
        eta.values[2] *= 2.0;
        let err = eta.verify(0.3, EPS).unwrap_err();
        assert_eq!(err.diagnostics().unwrap().invariant, Some(Invariant::EtaNorm));
    }
}
