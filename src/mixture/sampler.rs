//! Mixture assembly and the stateful sampler.
//!
//! A draw picks a dispersion ratio `varphi2` from the Beta prior, samples
//! gamma and eta for it, and rescales them into child moments:
//!
//! ```text
//! alpha_i = gamma_i / sqrt(p_i)        mu_i    = mean + sd * alpha_i
//! tau_i   = eta_i   / sqrt(p_i)        sigma_i = sd * tau_i
//! ```
//!
//! so that `sum p_i mu_i = mean` and
//! `sum p_i (mu_i^2 + sigma_i^2) - mean^2 = sd^2`.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use rayon::prelude::*;
use tracing::debug;

use crate::mixture::angles::{check_varphi2, EtaVector, GammaVector};
use crate::mixture::basis::OrthonormalBasis;
use crate::mixture::cache::BasisCache;
use crate::mixture::config::{ConfigError, SamplerConfig, SamplerStats, DEFAULT_TOLERANCE};
use crate::mixture::error::MixtureError;
use crate::mixture::moments::{moment_violation, violation};
use crate::mixture::types::{Mixture, MixtureSpec};

/// Build the Beta prior on varphi2 from a validated config.
fn dispersion_prior(config: &SamplerConfig) -> Result<Beta<f64>, ConfigError> {
    config.validate()?;
    Beta::new(config.beta_a, config.beta_b)
        .map_err(|_| ConfigError::InvalidPrior("beta_a", config.beta_a))
}

/// The single-child mixture: the parent itself.
fn single_child(spec: &MixtureSpec) -> Mixture {
    Mixture {
        child_means: vec![spec.parent_mean],
        child_sds: vec![spec.parent_sd],
        varphi2: None,
    }
}

/// Draw one mixture with a given dispersion ratio on a prebuilt basis.
///
/// Requires at least two children; the basis must have been built for the
/// weights of `spec`. Every postcondition is checked, and a failure returns an
/// [`MixtureError::InvariantViolation`] carrying the angles, varphi2, and
/// intermediate vectors.
pub fn draw_mixture<R: Rng + ?Sized>(
    spec: &MixtureSpec,
    basis: &OrthonormalBasis,
    varphi2: f64,
    tolerance: f64,
    rng: &mut R,
) -> Result<Mixture, MixtureError> {
    spec.validate()?;
    check_varphi2(varphi2)?;
    if basis.weights() != spec.weights.as_slice() {
        return Err(MixtureError::invalid(
            "basis",
            format!(
                "basis was built for {} children with different weights",
                basis.k()
            ),
        ));
    }

    let gamma = GammaVector::sample(basis, varphi2, tolerance, rng)?;
    let eta = EtaVector::sample(spec.k(), varphi2, tolerance, rng)?;

    let sqrt_p = spec.weights.sqrt();
    let (mean, sd) = (spec.parent_mean, spec.parent_sd);

    let child_means: Vec<f64> = gamma
        .values
        .iter()
        .zip(&sqrt_p)
        .map(|(g, s)| (g / s) * sd + mean)
        .collect();
    let child_sds: Vec<f64> = eta
        .values
        .iter()
        .zip(&sqrt_p)
        .map(|(e, s)| sd * (e / s))
        .collect();

    if let Some(mut diag) = moment_violation(spec, &child_means, &child_sds, tolerance) {
        diag.varphi2 = varphi2;
        diag.varpi = gamma.angles;
        diag.xi = eta.angles;
        diag.gamma = gamma.values;
        diag.eta = eta.values;
        return Err(violation(diag));
    }

    debug!(k = spec.k(), varphi2, "drew mixture");

    Ok(Mixture {
        child_means,
        child_sds,
        varphi2: Some(varphi2),
    })
}

/// Split a parent `(mean, sd)` into `k` equally weighted children.
///
/// Uses the default Beta(2, 2) prior and tolerance. `k = 1` returns the
/// parent unchanged without touching `rng`.
///
/// # Example
/// ```
/// use finite_mixture_sampler::mixture::sample_mixture;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let mixture = sample_mixture(400.0, 50.0, 5, &mut rng).unwrap();
/// let mean: f64 = mixture.child_means.iter().sum::<f64>() / 5.0;
/// assert!((mean - 400.0).abs() < 1e-8);
/// ```
pub fn sample_mixture<R: Rng + ?Sized>(
    parent_mean: f64,
    parent_sd: f64,
    k: usize,
    rng: &mut R,
) -> Result<Mixture, MixtureError> {
    let spec = MixtureSpec::new(parent_mean, parent_sd, k)?;
    if spec.k() == 1 {
        return Ok(single_child(&spec));
    }

    let prior = dispersion_prior(&SamplerConfig::default())?;
    let basis = OrthonormalBasis::uniform(k)?;
    let varphi2 = prior.sample(rng);
    draw_mixture(&spec, &basis, varphi2, DEFAULT_TOLERANCE, rng)
}

/// A configured, seeded mixture sampler.
///
/// Owns its random generator, so a seeded sampler reproduces the same
/// sequence of draws. Bases are memoized per weight vector unless caching
/// is disabled.
///
/// # Example
/// ```
/// use finite_mixture_sampler::mixture::{MixtureSampler, MixtureSpec, SamplerConfig};
///
/// let mut sampler = MixtureSampler::new(SamplerConfig::default().with_seed(7)).unwrap();
/// let spec = MixtureSpec::new(0.0, 1.0, 3).unwrap();
/// let mixture = sampler.sample(&spec).unwrap();
/// assert_eq!(mixture.k(), 3);
/// ```
#[derive(Debug)]
pub struct MixtureSampler {
    /// Configuration for the sampler.
    config: SamplerConfig,

    /// Beta prior on the dispersion ratio.
    prior: Beta<f64>,

    /// Memoized bases.
    cache: BasisCache,

    /// Random number generator.
    rng: StdRng,

    /// Statistics tracking.
    stats: SamplerStats,
}

impl MixtureSampler {
    /// Create a sampler from a configuration.
    pub fn new(config: SamplerConfig) -> Result<Self, MixtureError> {
        let prior = dispersion_prior(&config)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            prior,
            cache: BasisCache::new(),
            rng,
            stats: SamplerStats::new(),
        })
    }

    /// Draw one mixture, sampling varphi2 from the prior.
    pub fn sample(&mut self, spec: &MixtureSpec) -> Result<Mixture, MixtureError> {
        let start = Instant::now();
        let result = self.sample_inner(spec, None);
        self.stats.add_elapsed(start.elapsed().as_secs_f64());
        result
    }

    /// Draw one mixture with a fixed dispersion ratio.
    pub fn sample_with_varphi2(
        &mut self,
        spec: &MixtureSpec,
        varphi2: f64,
    ) -> Result<Mixture, MixtureError> {
        check_varphi2(varphi2)?;
        let start = Instant::now();
        let result = self.sample_inner(spec, Some(varphi2));
        self.stats.add_elapsed(start.elapsed().as_secs_f64());
        result
    }

    /// Draw `n` mixtures sequentially from this sampler's generator.
    pub fn sample_many(&mut self, spec: &MixtureSpec, n: usize) -> Result<Vec<Mixture>, MixtureError> {
        let start = Instant::now();
        let result: Result<Vec<Mixture>, MixtureError> =
            (0..n).map(|_| self.sample_inner(spec, None)).collect();
        self.stats.add_elapsed(start.elapsed().as_secs_f64());
        result
    }

    /// Draw `n` mixtures in parallel.
    ///
    /// Draw `i` uses its own generator seeded from a base seed plus `i`, so
    /// a seeded sampler yields the same batch for any thread count.
    pub fn sample_parallel(
        &mut self,
        spec: &MixtureSpec,
        n: usize,
    ) -> Result<Vec<Mixture>, MixtureError> {
        self.sample_parallel_with(spec, n, |_| {})
    }

    /// Like [`sample_parallel`](Self::sample_parallel), calling `on_draw`
    /// with each draw index as it completes.
    pub fn sample_parallel_with<F>(
        &mut self,
        spec: &MixtureSpec,
        n: usize,
        on_draw: F,
    ) -> Result<Vec<Mixture>, MixtureError>
    where
        F: Fn(usize) + Sync,
    {
        spec.validate()?;
        let start = Instant::now();
        let base_seed: u64 = self.rng.gen();

        let basis = if spec.k() >= 2 {
            Some(self.basis_for(spec)?)
        } else {
            None
        };
        let prior = &self.prior;
        let tolerance = self.config.tolerance;

        let run = || -> Result<Vec<Mixture>, MixtureError> {
            (0..n)
                .into_par_iter()
                .map(|i| {
                    let mixture = match &basis {
                        None => single_child(spec),
                        Some(basis) => {
                            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
                            let varphi2 = prior.sample(&mut rng);
                            draw_mixture(spec, basis, varphi2, tolerance, &mut rng)?
                        }
                    };
                    on_draw(i);
                    Ok(mixture)
                })
                .collect()
        };

        let draws = match self.config.num_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| MixtureError::invalid("num_threads", e.to_string()))?
                .install(run),
            None => run(),
        }?;

        for mixture in &draws {
            self.stats.record(mixture.varphi2);
        }
        self.stats.add_elapsed(start.elapsed().as_secs_f64());
        debug!(k = spec.k(), draws = n, "drew parallel batch");

        Ok(draws)
    }

    fn sample_inner(
        &mut self,
        spec: &MixtureSpec,
        varphi2: Option<f64>,
    ) -> Result<Mixture, MixtureError> {
        spec.validate()?;
        if spec.k() == 1 {
            self.stats.record(None);
            return Ok(single_child(spec));
        }

        let basis = self.basis_for(spec)?;
        let varphi2 = match varphi2 {
            Some(v) => v,
            None => self.prior.sample(&mut self.rng),
        };
        let mixture = draw_mixture(spec, &basis, varphi2, self.config.tolerance, &mut self.rng)?;

        self.stats.record(mixture.varphi2);
        Ok(mixture)
    }

    fn basis_for(&self, spec: &MixtureSpec) -> Result<Arc<OrthonormalBasis>, MixtureError> {
        if self.config.cache_bases {
            self.cache.get_or_build(&spec.weights)
        } else {
            Ok(Arc::new(OrthonormalBasis::weighted(&spec.weights)?))
        }
    }

    /// Get current statistics.
    pub fn stats(&self) -> &SamplerStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats = SamplerStats::new();
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Get reference to the basis cache.
    pub fn cache(&self) -> &BasisCache {
        &self.cache
    }
}
