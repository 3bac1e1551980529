//! Constrained finite-mixture sampling.
//!
//! This module splits a parent distribution `(mean, sd)` into `k` weighted
//! child distributions whose mixture reproduces the parent's mean and
//! variance exactly.
//!
//! # Overview
//!
//! A draw is parameterized by a single dispersion ratio `varphi2 ~ Beta(2, 2)`:
//! the fraction of parent variance that goes into the spread of the child
//! means, with the rest going into the children's own variances.
//!
//! 1. Build the orthonormal contrast basis for the child weights
//!    ([`basis`]).
//! 2. Sample the mean-offset vector gamma on that basis and the spread
//!    vector eta on the positive orthant, both via hyperspherical angles
//!    ([`angles`]).
//! 3. Rescale into child moments and verify the parent moments are
//!    reproduced ([`sampler`], [`moments`]).
//!
//! # Guarantees
//!
//! For weights `p` (uniform `1/k` by default), every returned mixture
//! satisfies, within the configured tolerance:
//!
//! ```text
//! sum_i p_i mu_i                              = mean
//! sum_i p_i (mu_i^2 + sigma_i^2) - mean^2     = sd^2
//! ```
//!
//! A single child is the parent itself. A failed check is reported as
//! [`MixtureError::InvariantViolation`] with the full sampled state.
//!
//! # Example
//!
//! ```
//! use finite_mixture_sampler::mixture::{MixtureSampler, MixtureSpec, SamplerConfig};
//!
//! let mut sampler = MixtureSampler::new(SamplerConfig::default().with_seed(42)).unwrap();
//! let spec = MixtureSpec::new(400.0, 50.0, 5).unwrap();
//!
//! let mixture = sampler.sample(&spec).unwrap();
//! for (mean, sd) in mixture.children() {
//!     println!("child: mean={:.2} sd={:.2}", mean, sd);
//! }
//! ```
//!
//! # References
//!
//! - Moment-preserving finite mixture construction, arXiv:1601.01178

pub mod angles;
pub mod basis;
pub mod cache;
pub mod config;
pub mod error;
pub mod moments;
pub mod sampler;
pub mod types;

// Re-export main types for convenient access
pub use angles::{sample_eta, sample_gamma, EtaVector, GammaVector};
pub use basis::{orthonormal_basis, OrthonormalBasis};
pub use cache::BasisCache;
pub use config::{ConfigError, SamplerConfig, SamplerStats, DEFAULT_TOLERANCE};
pub use error::{Invariant, InvariantDiagnostics, MixtureError};
pub use moments::{combine_children, recover_varphi2, verify_mixture};
pub use sampler::{draw_mixture, sample_mixture, MixtureSampler};
pub use types::{ChildWeights, Mixture, MixtureSpec};
