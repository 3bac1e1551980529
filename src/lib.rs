//! # Finite Mixture Sampler
//!
//! Moment-preserving splitting of a parent value distribution into child
//! distributions, as used when simulating game-tree search: a node's value
//! estimate `(mean, sd)` is divided among its `k` children so that the
//! mixture of the children reproduces the parent's mean and variance.
//!
//! ## Features
//!
//! - **Exact moments**: Every draw is checked against the parent mean and variance
//! - **Single dispersion knob**: `varphi2 ~ Beta(2, 2)` splits variance between
//!   child-mean spread and child-own spread
//! - **Weighted children**: Uniform or arbitrary child weights
//! - **Reproducible**: Explicit random generators, seeded samplers, and
//!   thread-count-independent parallel batches
//!
//! ## Quick Start
//!
//! ```
//! use finite_mixture_sampler::mixture::sample_mixture;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mixture = sample_mixture(400.0, 50.0, 5, &mut rng).unwrap();
//! assert_eq!(mixture.child_means.len(), 5);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    MixtureSampler / sample_mixture              │
//! │  - Beta prior on varphi2     - Moment invariant checks          │
//! │  - Child rescaling           - Parallel batches                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!         ┌─────────────────────┼─────────────────────┐
//!         ▼                     ▼                     ▼
//!   ┌───────────┐        ┌─────────────┐       ┌─────────────┐
//!   │ Orthonorm │        │ Gamma angle │       │  Eta angle  │
//!   │   basis   │──────▶ │   sampler   │       │   sampler   │
//!   └───────────┘        └─────────────┘       └─────────────┘
//! ```

#![warn(missing_docs)]

/// Finite-mixture sampling module.
///
/// Contains the basis construction, angle samplers, and mixture assembly.
pub mod mixture;

// Re-export commonly used types at crate root for convenience
pub use mixture::{
    orthonormal_basis, sample_mixture, ChildWeights, Mixture, MixtureError, MixtureSampler,
    MixtureSpec, SamplerConfig,
};
