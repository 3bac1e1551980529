//! Memoized orthonormal bases.
//!
//! A basis depends only on the child weights, so a sampler that draws many
//! mixtures for the same child count can build it once. The cache is shared
//! across rayon workers during parallel batch sampling.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::mixture::basis::OrthonormalBasis;
use crate::mixture::error::MixtureError;
use crate::mixture::types::ChildWeights;

/// Thread-safe cache of bases keyed by the exact bit patterns of the weights.
///
/// Entries are never evicted: one basis (`k^2` floats) is kept per distinct
/// weight vector. Callers that stream many different weightings should call
/// [`BasisCache::clear`] periodically or disable caching in the config.
#[derive(Debug, Default)]
pub struct BasisCache {
    entries: RwLock<FxHashMap<Vec<u64>, Arc<OrthonormalBasis>>>,
}

impl BasisCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
        }
    }

    /// Get the basis for `weights`, building and inserting it on a miss.
    pub fn get_or_build(&self, weights: &ChildWeights) -> Result<Arc<OrthonormalBasis>, MixtureError> {
        let key = cache_key(weights);

        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(basis) = entries.get(&key) {
                trace!(k = weights.k(), "basis cache hit");
                return Ok(Arc::clone(basis));
            }
        }

        trace!(k = weights.k(), "basis cache miss");
        let basis = Arc::new(OrthonormalBasis::weighted(weights)?);

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key).or_insert(basis);
        Ok(Arc::clone(entry))
    }

    /// Number of cached bases.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached bases.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

fn cache_key(weights: &ChildWeights) -> Vec<u64> {
    weights.as_slice().iter().map(|w| w.to_bits()).collect()
}
