//! Configuration options for the mixture sampler.
//!
//! This module provides the configuration struct that controls the
//! dispersion prior, the numerical tolerance of invariant checks, seeding,
//! and caching, plus the statistics a sampler accumulates.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tolerance for postcondition checks.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Configuration for the mixture sampler.
///
/// # Example
/// ```
/// use finite_mixture_sampler::mixture::SamplerConfig;
///
/// let config = SamplerConfig::default().with_seed(7);
/// assert_eq!(config.beta_a, 2.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// First shape parameter of the Beta prior on varphi2.
    pub beta_a: f64,

    /// Second shape parameter of the Beta prior on varphi2.
    pub beta_b: f64,

    /// Tolerance for the gamma/eta and mixture moment checks.
    ///
    /// The allowed error is scaled by the magnitude of the checked
    /// quantities, so large parent means do not trip the check on rounding.
    pub tolerance: f64,

    /// Random seed for reproducibility.
    ///
    /// If `None`, the sampler seeds itself from OS entropy.
    pub seed: Option<u64>,

    /// Memoize orthonormal bases per weight vector.
    pub cache_bases: bool,

    /// Number of threads for parallel batch sampling.
    ///
    /// Set to `None` to use the rayon global pool.
    pub num_threads: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            beta_a: 2.0,
            beta_b: 2.0,
            tolerance: DEFAULT_TOLERANCE,
            seed: None,
            cache_bases: true,
            num_threads: None,
        }
    }
}

impl SamplerConfig {
    /// Create a new SamplerConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the Beta prior shape parameters.
    pub fn with_prior(mut self, beta_a: f64, beta_b: f64) -> Self {
        self.beta_a = beta_a;
        self.beta_b = beta_b;
        self
    }

    /// Builder method: set the check tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method: enable or disable the basis cache.
    pub fn with_cache(mut self, enable: bool) -> Self {
        self.cache_bases = enable;
        self
    }

    /// Builder method: set number of threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.beta_a.is_finite() && self.beta_a > 0.0) {
            return Err(ConfigError::InvalidPrior("beta_a", self.beta_a));
        }
        if !(self.beta_b.is_finite() && self.beta_b > 0.0) {
            return Err(ConfigError::InvalidPrior("beta_b", self.beta_b));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Errors that can occur when loading or validating sampler configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A Beta shape parameter is not a positive finite number.
    #[error("prior parameter {0} = {1} must be positive and finite")]
    InvalidPrior(&'static str, f64),
    /// Tolerance is not a positive finite number.
    #[error("tolerance {0} must be positive and finite")]
    InvalidTolerance(f64),
    /// The config file could not be read.
    #[error("could not read config: {0}")]
    Io(String),
    /// The config file is not valid JSON for this struct.
    #[error("could not parse config: {0}")]
    Parse(String),
}

/// Statistics tracked by a sampler across draws.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerStats {
    /// Total number of mixtures drawn.
    pub draws: u64,

    /// Draws that hit the single-child shortcut.
    pub degenerate_draws: u64,

    /// Running mean of the sampled dispersion ratio (non-degenerate draws only).
    pub mean_varphi2: f64,

    /// Total time spent sampling (in seconds).
    pub elapsed_seconds: f64,

    /// Draws per second.
    pub draws_per_second: f64,
}

impl SamplerStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one draw. `varphi2` is `None` for single-child draws.
    pub fn record(&mut self, varphi2: Option<f64>) {
        self.draws += 1;
        match varphi2 {
            Some(v) => {
                let n = (self.draws - self.degenerate_draws) as f64;
                self.mean_varphi2 += (v - self.mean_varphi2) / n;
            }
            None => self.degenerate_draws += 1,
        }
    }

    /// Add sampling time and refresh the rate.
    pub fn add_elapsed(&mut self, seconds: f64) {
        self.elapsed_seconds += seconds;
        if self.elapsed_seconds > 0.0 {
            self.draws_per_second = self.draws as f64 / self.elapsed_seconds;
        }
    }
}
