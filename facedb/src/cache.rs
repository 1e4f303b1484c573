use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kcentroid::{KernelCentroid, KernelParams};
use crate::normalizer::VectorNormalizer;
use crate::store::EmbeddingStore;
use crate::types::EMBEDDING_DIM;

/// One identity's fitted centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub centroid: KernelCentroid,
}

/// Derived, approximate view of the store used by the fast matcher.
///
/// The normalizer and every centroid are fit from the same snapshot of the
/// store and replaced together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentroidCache {
    normalizer: VectorNormalizer,
    entries: Vec<CacheEntry>,
}

impl CentroidCache {
    /// Fits the normalizer over every stored embedding, then one centroid per
    /// identity in store order. An empty store gives an empty cache.
    pub fn build(store: &EmbeddingStore, params: KernelParams) -> Self {
        let normalizer = VectorNormalizer::fit(
            store
                .identities()
                .iter()
                .flat_map(|i| i.samples.iter())
                .map(|s| s.embedding.as_slice()),
        );

        let entries: Vec<CacheEntry> = store
            .identities()
            .iter()
            .map(|ident| {
                let normed: Vec<Vec<f32>> = ident
                    .samples
                    .iter()
                    .map(|s| normalizer.apply(&s.embedding))
                    .collect();
                let centroid =
                    KernelCentroid::train(params, normed.iter().map(|v| v.as_slice()));
                CacheEntry {
                    name: ident.name.clone(),
                    centroid,
                }
            })
            .collect();

        debug!(
            identities = entries.len(),
            samples = store.sample_count(),
            "facedb: rebuilt centroid cache"
        );
        Self {
            normalizer,
            entries,
        }
    }

    pub fn normalizer(&self) -> &VectorNormalizer {
        &self.normalizer
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Identity names in cache order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Checks a cache read from disk: every vector must have the embedding
    /// dimension and every number must be finite.
    pub(crate) fn is_well_formed(&self) -> bool {
        let finite = |v: &[f64]| v.iter().all(|x| x.is_finite());
        self.normalizer.mean().len() == EMBEDDING_DIM
            && self.normalizer.inv_std().len() == EMBEDDING_DIM
            && finite(self.normalizer.mean())
            && finite(self.normalizer.inv_std())
            && self
                .entries
                .iter()
                .all(|e| e.centroid.is_well_formed(EMBEDDING_DIM))
    }

    /// Reports whether the cache was built from a store with exactly these
    /// identities in this order.
    pub fn covers(&self, store: &EmbeddingStore) -> bool {
        self.entries.len() == store.identity_count()
            && self
                .entries
                .iter()
                .zip(store.identities())
                .all(|(e, i)| e.name == i.name)
    }
}
