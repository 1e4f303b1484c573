//! The two match strategies.
//!
//! [`find_fast`] scores the query against one kernel centroid per identity:
//! cost grows with the number of identities only. [`find_slow`] measures the
//! query against every stored sample and ranks identities by a trimmed
//! root-mean-square distance: exact, and linear in the number of samples.
//!
//! Both return `None` when nothing can be scored. Lower scores win, ties
//! keep the identity seen first, and an identity scoring NaN is skipped.

use tracing::warn;

use crate::cache::CentroidCache;
use crate::store::EmbeddingStore;
use crate::types::{Embedding, Match};

/// Distances beyond this count are trimmed to their middle half.
pub const DEFAULT_TRIM_MIN_SAMPLES: usize = 15;

/// Returns the identity whose centroid scores lowest for `query`.
pub fn find_fast(cache: &CentroidCache, query: &Embedding) -> Option<Match> {
    if cache.is_empty() {
        warn!("facedb: fast match against empty database");
        return None;
    }

    let normed = cache.normalizer().apply(query);
    let mut best: Option<Match> = None;
    for entry in cache.entries() {
        let score = entry.centroid.score(&normed);
        if score.is_nan() {
            warn!(name = %entry.name, "facedb: centroid scored NaN, skipping identity");
            continue;
        }
        if best.as_ref().is_none_or(|b| score < b.score) {
            best = Some(Match {
                name: entry.name.clone(),
                score,
            });
        }
    }
    best
}

/// Returns the identity whose stored samples are closest to `query` by
/// trimmed RMS distance. Identities with more than `trim_min` distinct
/// adjacent distances only count their middle half.
pub fn find_slow(store: &EmbeddingStore, query: &Embedding, trim_min: usize) -> Option<Match> {
    let mut best: Option<Match> = None;
    for ident in store.identities() {
        let distances: Vec<f64> = ident
            .samples
            .iter()
            .map(|s| query.distance(&s.embedding))
            .collect();

        let Some(score) = trimmed_rms(distances, trim_min) else {
            warn!(name = %ident.name, "facedb: no samples to score for identity");
            continue;
        };
        if score.is_nan() {
            warn!(name = %ident.name, "facedb: distance scored NaN, skipping identity");
            continue;
        }
        if best.as_ref().is_none_or(|b| score < b.score) {
            best = Some(Match {
                name: ident.name.clone(),
                score,
            });
        }
    }
    best
}

/// Root-mean-square of `distances` after dampening outliers.
///
/// Runs of equal adjacent values collapse to one (order is preserved, there
/// is no sort). If more than `trim_min` values remain, only ranks
/// `[n/4, n/2 + n/4)` are kept, found with two partial selections.
/// Returns `None` if nothing is left to average.
pub fn trimmed_rms(mut distances: Vec<f64>, trim_min: usize) -> Option<f64> {
    distances.dedup();

    let n = distances.len();
    let range = if n > trim_min {
        let quarter = n / 4;
        let hi = n / 2 + quarter;
        let cmp = |a: &f64, b: &f64| a.total_cmp(b);

        // Ranks below `quarter` end up in front of it.
        distances.select_nth_unstable_by(quarter, cmp);
        // Within the rest, ranks below `hi` end up in front of position `hi`.
        distances[quarter..].select_nth_unstable_by(hi - quarter, cmp);
        quarter..hi
    } else {
        0..n
    };

    let kept = &distances[range];
    if kept.is_empty() {
        return None;
    }
    let sum_sq: f64 = kept.iter().map(|d| d * d).sum();
    Some((sum_sq / kept.len() as f64).sqrt())
}
