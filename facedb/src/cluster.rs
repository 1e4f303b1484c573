//! Grouping of faces that have no identity yet.
//!
//! Faces closer than a distance threshold are joined by an edge and the
//! resulting graph is partitioned with chinese whispers: every node starts
//! in its own class and repeatedly adopts the class most common among its
//! neighbours. Connectivity, not pairwise similarity, decides membership,
//! so two faces too far apart to be linked directly still end up together
//! when a chain of close faces connects them.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Embedding, FaceSample};

/// Recognition networks trained for a 0.6 decision boundary still merge
/// unrelated faces at that distance; 0.5 misses a few matches but keeps
/// clusters clean.
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.5;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Controls unknown-face clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Faces closer than this (Euclidean) are linked. Default: 0.5.
    pub threshold: f64,

    /// Upper bound on label-propagation passes. Default: 100.
    pub max_iterations: usize,

    /// Fixes the visiting order for reproducible runs.
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }
}

impl ClusterConfig {
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.threshold <= 0.0 {
            self.threshold = DEFAULT_CLUSTER_THRESHOLD;
        }
        if self.max_iterations == 0 {
            self.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        self
    }
}

/// Output of [`cluster_embeddings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    /// Cluster index per input, in `0..count`, numbered by first appearance.
    pub labels: Vec<usize>,
    pub count: usize,
    /// Label-propagation passes actually run.
    pub iterations: usize,
}

/// Display name given to members of cluster `index`.
pub fn unknown_label(index: usize) -> String {
    format!("Unknown {index}")
}

/// First cluster index whose label is not among `names`: one past the
/// largest `"Unknown {i}"`, or 0.
pub fn next_unknown_index<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .filter_map(|n| n.strip_prefix("Unknown ")?.parse::<usize>().ok())
        .map(|i| i + 1)
        .max()
        .unwrap_or(0)
}

/// Clusters `embeddings` by threshold graph + chinese whispers.
pub fn cluster_embeddings(embeddings: &[&Embedding], cfg: &ClusterConfig) -> Clustering {
    let cfg = cfg.clone().with_defaults();
    let n = embeddings.len();
    if n == 0 {
        return Clustering {
            labels: Vec::new(),
            count: 0,
            iterations: 0,
        };
    }

    let adjacency = threshold_graph(embeddings, cfg.threshold);
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (raw, iterations) = chinese_whispers(&adjacency, cfg.max_iterations, &mut rng);
    let (labels, count) = compact(&raw);

    debug!(
        faces = n,
        clusters = count,
        iterations,
        "facedb: clustered unknown faces"
    );
    Clustering {
        labels,
        count,
        iterations,
    }
}

/// Labels each sample `"Unknown {i}"` by cluster and returns the number of
/// clusters. Rects and image ids are carried along untouched.
pub fn group_unknown_faces(faces: &mut [FaceSample], cfg: &ClusterConfig) -> usize {
    group_unknown_faces_from(faces, cfg, 0)
}

/// Like [`group_unknown_faces`], numbering clusters from `first` instead of 0.
pub fn group_unknown_faces_from(
    faces: &mut [FaceSample],
    cfg: &ClusterConfig,
    first: usize,
) -> usize {
    let embeddings: Vec<&Embedding> = faces.iter().map(|f| &f.embedding).collect();
    let clustering = cluster_embeddings(&embeddings, cfg);
    for (face, &label) in faces.iter_mut().zip(clustering.labels.iter()) {
        face.name = unknown_label(first + label);
    }
    clustering.count
}

/// Undirected adjacency lists; an edge joins `i != j` with distance below
/// `threshold`.
fn threshold_graph(embeddings: &[&Embedding], threshold: f64) -> Vec<Vec<usize>> {
    let n = embeddings.len();
    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if embeddings[i].distance(embeddings[j]) < threshold {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    adjacency
}

/// Runs label propagation until a pass changes nothing or `max_iterations`
/// passes have run. Returns raw labels and passes run.
fn chinese_whispers(
    adjacency: &[Vec<usize>],
    max_iterations: usize,
    rng: &mut StdRng,
) -> (Vec<usize>, usize) {
    let n = adjacency.len();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut order: Vec<usize> = (0..n).collect();
    let mut counts: Vec<(usize, usize)> = Vec::new();
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;
        let mut changed = false;
        order.shuffle(rng);

        for &i in &order {
            if adjacency[i].is_empty() {
                continue;
            }

            counts.clear();
            for &j in &adjacency[i] {
                let l = labels[j];
                match counts.iter_mut().find(|(label, _)| *label == l) {
                    Some((_, c)) => *c += 1,
                    None => counts.push((l, 1)),
                }
            }

            let best = counts.iter().map(|&(_, c)| c).max().unwrap_or(0);
            let current = labels[i];
            let keeps_current = counts.iter().any(|&(l, c)| l == current && c == best);
            if keeps_current {
                continue;
            }
            let next = counts
                .iter()
                .filter(|&&(_, c)| c == best)
                .map(|&(l, _)| l)
                .min()
                .unwrap_or(current);
            if next != current {
                labels[i] = next;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    (labels, iterations)
}

/// Renumbers labels to `0..count` in order of first appearance.
fn compact(raw: &[usize]) -> (Vec<usize>, usize) {
    let mut seen: Vec<(usize, usize)> = Vec::new();
    let mut out = Vec::with_capacity(raw.len());
    for &l in raw {
        let idx = match seen.iter().find(|(r, _)| *r == l) {
            Some(&(_, idx)) => idx,
            None => {
                let idx = seen.len();
                seen.push((l, idx));
                idx
            }
        };
        out.push(idx);
    }
    (out, seen.len())
}
