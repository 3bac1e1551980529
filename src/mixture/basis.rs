//! Orthonormal contrast basis for mixture weights.
//!
//! For child weights `p` of length `k`, the basis consists of `k - 1`
//! unit vectors in R^k that are mutually orthogonal and orthogonal to
//! `(sqrt(p_1), ..., sqrt(p_k))`. With uniform weights that last property
//! is exactly "each row sums to zero", so any linear combination of rows is
//! a valid set of mean offsets.
//!
//! Row `s` (1-indexed) contrasts the first `s` children against child
//! `s + 1`, a weighted generalization of Helmert contrasts:
//!
//! ```text
//! s = 1:  [ -sqrt(p_2), +sqrt(p_1), 0, ..., 0 ]
//! s >= 2: [ -sqrt(p_1 p_{s+1}) / sqrt(P_s), ..., -sqrt(p_s p_{s+1}) / sqrt(P_s),
//!           +sqrt(P_s), 0, ..., 0 ]          where P_s = p_1 + ... + p_s
//! ```
//!
//! Each row is normalized to unit length after construction.

use crate::mixture::error::MixtureError;
use crate::mixture::types::ChildWeights;

/// A `(k - 1) x k` matrix of orthonormal contrast rows, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthonormalBasis {
    k: usize,
    weights: Vec<f64>,
    data: Vec<f64>,
}

impl OrthonormalBasis {
    /// Basis for `k` equally weighted children.
    ///
    /// Undefined for `k < 2`: a single child admits no contrasts.
    pub fn uniform(k: usize) -> Result<Self, MixtureError> {
        if k < 2 {
            return Err(MixtureError::invalid(
                "k",
                format!("orthonormal basis needs at least 2 children, got {}", k),
            ));
        }
        let weights = ChildWeights::uniform(k)?;
        Ok(Self::build(weights.as_slice()))
    }

    /// Basis for arbitrary child weights.
    pub fn weighted(weights: &ChildWeights) -> Result<Self, MixtureError> {
        if weights.k() < 2 {
            return Err(MixtureError::invalid(
                "weights",
                format!(
                    "orthonormal basis needs at least 2 children, got {}",
                    weights.k()
                ),
            ));
        }
        Ok(Self::build(weights.as_slice()))
    }

    fn build(p: &[f64]) -> Self {
        let k = p.len();
        let mut data = Vec::with_capacity((k - 1) * k);

        for s in 1..k {
            let row: Vec<f64> = (1..=k).map(|j| contrast_entry(p, s, j)).collect();
            let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
            data.extend(row.iter().map(|x| x / norm));
        }

        Self {
            k,
            weights: p.to_vec(),
            data,
        }
    }

    /// Number of children (length of each row).
    pub fn k(&self) -> usize {
        self.k
    }

    /// Child weights the basis was built for.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of rows (`k - 1`).
    pub fn dim(&self) -> usize {
        self.k - 1
    }

    /// Row `i` (0-indexed).
    ///
    /// # Panics
    /// Panics if `i >= self.dim()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.k..(i + 1) * self.k]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.k)
    }

    /// Copy the basis into nested vectors.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    /// Linear combination `sum_i coeffs[i] * row(i)`.
    ///
    /// # Panics
    /// Panics if `coeffs.len() != self.dim()`.
    pub fn combine(&self, coeffs: &[f64]) -> Vec<f64> {
        assert_eq!(
            coeffs.len(),
            self.dim(),
            "expected {} coefficients, got {}",
            self.dim(),
            coeffs.len()
        );
        let mut out = vec![0.0; self.k];
        for (row, &c) in self.rows().zip(coeffs) {
            for (o, &r) in out.iter_mut().zip(row) {
                *o += r * c;
            }
        }
        out
    }
}

/// Unnormalized entry `j` of contrast row `s` (both 1-indexed).
fn contrast_entry(p: &[f64], s: usize, j: usize) -> f64 {
    if s == 1 {
        return match j {
            1 => -p[1].sqrt(),
            2 => p[0].sqrt(),
            _ => 0.0,
        };
    }

    let prefix: f64 = p[..s].iter().sum();
    if j <= s {
        -(p[j - 1] * p[s]).sqrt() / prefix.sqrt()
    } else if j == s + 1 {
        prefix.sqrt()
    } else {
        0.0
    }
}

/// Orthonormal contrast basis for `k` equally weighted children.
///
/// Returns `k - 1` rows of length `k`. Fails for `k < 2`.
pub fn orthonormal_basis(k: usize) -> Result<OrthonormalBasis, MixtureError> {
    OrthonormalBasis::uniform(k)
}
