//! Input and output types for mixture sampling.

use serde::{Deserialize, Serialize};

use crate::mixture::error::MixtureError;

/// Maximum deviation of a weight vector's sum from 1.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weights of the children in a mixture.
///
/// Every entry is positive and finite and the entries sum to 1. Uniform
/// weights (`1/k` each) are the common case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ChildWeights {
    weights: Vec<f64>,
    uniform: bool,
}

impl ChildWeights {
    /// Uniform weights over `k` children.
    pub fn uniform(k: usize) -> Result<Self, MixtureError> {
        if k == 0 {
            return Err(MixtureError::invalid("k", "child count must be at least 1, got 0"));
        }
        Ok(Self {
            weights: vec![1.0 / k as f64; k],
            uniform: true,
        })
    }

    /// Explicit weights. Must be non-empty, positive, finite, and sum to 1.
    pub fn new(weights: Vec<f64>) -> Result<Self, MixtureError> {
        if weights.is_empty() {
            return Err(MixtureError::invalid("weights", "must contain at least one weight"));
        }
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w > 0.0))
        {
            return Err(MixtureError::invalid(
                "weights",
                format!("weight {} is {}, must be positive and finite", i, w),
            ));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MixtureError::invalid(
                "weights",
                format!("weights sum to {}, expected 1", total),
            ));
        }
        let uniform = weights.iter().all(|&w| w == weights[0]);
        Ok(Self { weights, uniform })
    }

    /// Number of children.
    pub fn k(&self) -> usize {
        self.weights.len()
    }

    /// The weights as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// True if every child has the same weight.
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    /// Element-wise square roots of the weights.
    pub fn sqrt(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.sqrt()).collect()
    }
}

impl TryFrom<Vec<f64>> for ChildWeights {
    type Error = MixtureError;

    fn try_from(weights: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<ChildWeights> for Vec<f64> {
    fn from(weights: ChildWeights) -> Self {
        weights.weights
    }
}

/// A request to split a parent distribution into children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureSpec {
    /// Mean of the parent distribution.
    pub parent_mean: f64,
    /// Standard deviation of the parent distribution.
    pub parent_sd: f64,
    /// Child weights; their length is the child count.
    pub weights: ChildWeights,
}

impl MixtureSpec {
    /// Split into `k` equally weighted children.
    pub fn new(parent_mean: f64, parent_sd: f64, k: usize) -> Result<Self, MixtureError> {
        let weights = ChildWeights::uniform(k)?;
        Self::weighted(parent_mean, parent_sd, weights)
    }

    /// Split into children with the given weights.
    pub fn weighted(
        parent_mean: f64,
        parent_sd: f64,
        weights: ChildWeights,
    ) -> Result<Self, MixtureError> {
        let spec = Self {
            parent_mean,
            parent_sd,
            weights,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Number of children.
    pub fn k(&self) -> usize {
        self.weights.k()
    }

    /// Check the input contract.
    pub fn validate(&self) -> Result<(), MixtureError> {
        if !self.parent_mean.is_finite() {
            return Err(MixtureError::invalid(
                "parent_mean",
                format!("must be finite, got {}", self.parent_mean),
            ));
        }
        if !self.parent_sd.is_finite() || self.parent_sd < 0.0 {
            return Err(MixtureError::invalid(
                "parent_sd",
                format!("must be non-negative and finite, got {}", self.parent_sd),
            ));
        }
        if self.weights.k() == 0 {
            return Err(MixtureError::invalid("k", "child count must be at least 1, got 0"));
        }
        Ok(())
    }
}

/// A sampled set of child distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixture {
    /// Mean of each child.
    pub child_means: Vec<f64>,
    /// Standard deviation of each child.
    pub child_sds: Vec<f64>,
    /// Dispersion ratio used for the draw; `None` for a single child.
    pub varphi2: Option<f64>,
}

impl Mixture {
    /// Number of children.
    pub fn k(&self) -> usize {
        self.child_means.len()
    }

    /// Iterate over `(mean, sd)` pairs.
    pub fn children(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.child_means
            .iter()
            .copied()
            .zip(self.child_sds.iter().copied())
    }
}
