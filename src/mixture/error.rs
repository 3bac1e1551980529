//! Error types for mixture sampling.
//!
//! There are two failure classes. Input-contract violations are reported
//! before any randomness is consumed. Invariant violations mean the sampling
//! math produced a mixture that does not reproduce the parent moments; they
//! carry the full sampled state so the defect can be reproduced.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::mixture::config::ConfigError;

/// Errors returned by the mixture sampler.
#[derive(Error, Debug, Clone)]
pub enum MixtureError {
    /// A caller-supplied value is outside its contract.
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// A sampled vector or mixture failed a postcondition.
    #[error("{0}")]
    InvariantViolation(Box<InvariantDiagnostics>),

    /// The sampler configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MixtureError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        MixtureError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True if this error reports a defect in the sampling math rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, MixtureError::InvariantViolation(_))
    }

    /// Diagnostics of an invariant violation, if this is one.
    pub fn diagnostics(&self) -> Option<&InvariantDiagnostics> {
        match self {
            MixtureError::InvariantViolation(diag) => Some(diag),
            _ => None,
        }
    }
}

/// The postconditions checked after each draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Invariant {
    /// Gamma is orthogonal to the square-root weight vector (zero-sum for uniform weights).
    GammaZeroSum,
    /// Sum of squares of gamma equals varphi2.
    GammaNorm,
    /// Sum of squares of eta equals 1 - varphi2.
    EtaNorm,
    /// Weighted mean of child means equals the parent mean.
    MixtureMean,
    /// Weighted second moment minus the squared parent mean equals the parent variance.
    MixtureVariance,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::GammaZeroSum => "gamma zero-sum",
            Invariant::GammaNorm => "gamma sum of squares",
            Invariant::EtaNorm => "eta sum of squares",
            Invariant::MixtureMean => "mixture mean",
            Invariant::MixtureVariance => "mixture variance",
        };
        f.write_str(name)
    }
}

/// Full sampler state at the point an invariant check failed.
///
/// Fields that were not yet computed when the check ran are left empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvariantDiagnostics {
    /// Which check failed.
    pub invariant: Option<Invariant>,
    /// Value the check expected.
    pub expected: f64,
    /// Value the sampled data produced.
    pub actual: f64,
    /// Absolute tolerance the check allowed.
    pub tolerance: f64,
    /// Child weights used for the draw.
    pub weights: Vec<f64>,
    /// Dispersion ratio used for the draw.
    pub varphi2: f64,
    /// Angles of the gamma (mean-offset) draw.
    pub varpi: Vec<f64>,
    /// Angles of the eta (spread) draw.
    pub xi: Vec<f64>,
    /// Normalized child-mean offsets.
    pub gamma: Vec<f64>,
    /// Normalized child-sd magnitudes.
    pub eta: Vec<f64>,
    /// Child means, if assembly was reached.
    pub child_means: Vec<f64>,
    /// Child standard deviations, if assembly was reached.
    pub child_sds: Vec<f64>,
}

impl fmt::Display for InvariantDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let invariant = self
            .invariant
            .map(|i| i.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        write!(
            f,
            "invariant `{}` violated: expected {}, got {} (tolerance {:e}); \
             varphi2={}, weights={:?}, varpi={:?}, xi={:?}, gamma={:?}, eta={:?}, \
             child_means={:?}, child_sds={:?}",
            invariant,
            self.expected,
            self.actual,
            self.tolerance,
            self.varphi2,
            self.weights,
            self.varpi,
            self.xi,
            self.gamma,
            self.eta,
            self.child_means,
            self.child_sds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_names_field() {
        let err = MixtureError::invalid("parent_sd", "must be non-negative, got -1");
        let msg = err.to_string();
        assert!(msg.contains("parent_sd"));
        assert!(msg.contains("-1"));
        assert!(!err.is_invariant_violation());
        assert!(err.diagnostics().is_none());
    }

    #[test]
    fn test_invariant_violation_carries_state() {
        let diag = InvariantDiagnostics {
            invariant: Some(Invariant::EtaNorm),
            expected: 0.5,
            actual: 0.7,
            tolerance: 1e-8,
            varphi2: 0.5,
            xi: vec![0.1, 0.2],
            ..Default::default()
        };
        let err = MixtureError::InvariantViolation(Box::new(diag));

        assert!(err.is_invariant_violation());
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.invariant, Some(Invariant::EtaNorm));
        assert_eq!(diag.xi, vec![0.1, 0.2]);

        let msg = err.to_string();
        assert!(msg.contains("eta sum of squares"));
        assert!(msg.contains("xi=[0.1, 0.2]"));
    }
}
