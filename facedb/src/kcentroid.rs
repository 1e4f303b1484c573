//! Radial-basis kernel centroid.
//!
//! Represents the mean of a set of points in the RBF feature space using a
//! small dictionary of the points themselves. A query is scored by its
//! feature-space distance to that mean:
//!
//! ```text
//! score(x)² = k(x,x) + αᵀKα − 2 Σ αᵢ k(dᵢ, x)
//! ```
//!
//! The score is 0 at the centre of a tight cluster and saturates at
//! `sqrt(1 + αᵀKα)` far away from every dictionary vector, so one stray
//! sample cannot pull the centroid far.
//!
//! Training is online. A new sample joins the dictionary only if it is not
//! already (nearly) spanned by it, judged by the approximate linear
//! dependence test `k(x,x) − kᵀK⁻¹k > tolerance`; otherwise its projection
//! onto the dictionary is folded into the weights.
//!
//! The dictionary never shrinks: once it holds `max_dictionary` vectors,
//! every further sample is projected onto it. No dictionary vector is swapped
//! out for a more informative one, so with a full dictionary the centroid
//! leans towards the samples seen first.

use serde::{Deserialize, Serialize};

use crate::types::squared_distance;

/// Training parameters for [`KernelCentroid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    /// RBF width: `k(a, b) = exp(-gamma * |a - b|²)`.
    pub gamma: f64,
    /// Minimum residual for a sample to be added to the dictionary.
    pub tolerance: f64,
    /// Upper bound on dictionary vectors per centroid.
    pub max_dictionary: usize,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            gamma: 0.001,
            tolerance: 1e-6,
            max_dictionary: 15,
        }
    }
}

fn rbf(gamma: f64, a: &[f32], b: &[f32]) -> f64 {
    (-gamma * squared_distance(a, b)).exp()
}

/// A trained centroid. Holds everything needed to score, nothing needed to
/// train further; the cache always retrains from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelCentroid {
    gamma: f64,
    dictionary: Vec<Vec<f32>>,
    alpha: Vec<f64>,
    bias: f64,
}

impl KernelCentroid {
    /// Trains a centroid over `samples` (already normalized).
    pub fn train<'a, I>(params: KernelParams, samples: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut t = Trainer::new(params);
        for s in samples {
            t.push(s);
        }
        t.finish()
    }

    /// Feature-space distance from `x` to the centroid. Never negative;
    /// lower means more similar to the training samples. NaN if `x` holds a
    /// NaN.
    pub fn score(&self, x: &[f32]) -> f64 {
        // k(x, x) = 1 for the RBF kernel.
        let mut cross = 0.0;
        for (d, &a) in self.dictionary.iter().zip(self.alpha.iter()) {
            cross += a * rbf(self.gamma, d, x);
        }
        let sq = 1.0 + self.bias - 2.0 * cross;
        // Rounding can dip just below zero; NaN falls through to sqrt.
        if sq < 0.0 { 0.0 } else { sq.sqrt() }
    }

    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Checks a centroid read from disk: matching lengths and finite numbers
    /// throughout.
    pub(crate) fn is_well_formed(&self, dim: usize) -> bool {
        self.gamma.is_finite()
            && self.gamma > 0.0
            && self.bias.is_finite()
            && self.alpha.len() == self.dictionary.len()
            && self.alpha.iter().all(|a| a.is_finite())
            && self
                .dictionary
                .iter()
                .all(|d| d.len() == dim && d.iter().all(|v| v.is_finite()))
    }
}

struct Trainer {
    params: KernelParams,
    dictionary: Vec<Vec<f32>>,
    alpha: Vec<f64>,
    k_inv: Vec<Vec<f64>>,
    seen: usize,
}

impl Trainer {
    fn new(params: KernelParams) -> Self {
        Self {
            params,
            dictionary: Vec::new(),
            alpha: Vec::new(),
            k_inv: Vec::new(),
            seen: 0,
        }
    }

    fn push(&mut self, x: &[f32]) {
        self.seen += 1;
        let xscale = 1.0 / self.seen as f64;
        let cscale = 1.0 - xscale;
        let kxx = 1.0;

        if self.dictionary.is_empty() {
            self.dictionary.push(x.to_vec());
            self.alpha.push(1.0);
            self.k_inv = vec![vec![1.0 / kxx]];
            return;
        }

        let kv: Vec<f64> = self
            .dictionary
            .iter()
            .map(|d| rbf(self.params.gamma, d, x))
            .collect();
        let a: Vec<f64> = self
            .k_inv
            .iter()
            .map(|row| row.iter().zip(kv.iter()).map(|(r, k)| r * k).sum::<f64>())
            .collect();
        let delta = kxx - kv.iter().zip(a.iter()).map(|(k, a)| k * a).sum::<f64>();

        let room = self.dictionary.len() < self.params.max_dictionary.max(1);
        if delta > self.params.tolerance && room {
            self.grow_inverse(&a, delta);
            self.dictionary.push(x.to_vec());
            for w in &mut self.alpha {
                *w *= cscale;
            }
            self.alpha.push(xscale);
        } else {
            for (w, ai) in self.alpha.iter_mut().zip(a.iter()) {
                *w = cscale * *w + xscale * ai;
            }
        }
    }

    /// Block-inverse update for appending one row/column to K.
    fn grow_inverse(&mut self, a: &[f64], delta: f64) {
        let m = self.k_inv.len();
        let mut next = vec![vec![0.0; m + 1]; m + 1];
        for i in 0..m {
            for j in 0..m {
                next[i][j] = self.k_inv[i][j] + a[i] * a[j] / delta;
            }
            next[i][m] = -a[i] / delta;
            next[m][i] = -a[i] / delta;
        }
        next[m][m] = 1.0 / delta;
        self.k_inv = next;
    }

    fn finish(self) -> KernelCentroid {
        let gamma = self.params.gamma;
        let mut bias = 0.0;
        for (i, di) in self.dictionary.iter().enumerate() {
            for (j, dj) in self.dictionary.iter().enumerate() {
                let k = if i == j { 1.0 } else { rbf(gamma, di, dj) };
                bias += self.alpha[i] * self.alpha[j] * k;
            }
        }
        KernelCentroid {
            gamma,
            dictionary: self.dictionary,
            alpha: self.alpha,
            bias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(gamma: f64) -> KernelParams {
        KernelParams {
            gamma,
            ..KernelParams::default()
        }
    }

    fn refs(v: &[Vec<f32>]) -> Vec<&[f32]> {
        v.iter().map(|x| x.as_slice()).collect()
    }

    #[test]
    fn single_sample_scores_zero_on_itself() {
        let x = vec![0.3f32, -1.2, 0.7];
        let c = KernelCentroid::train(params(0.5), [x.as_slice()]);
        assert!(c.score(&x) < 1e-9);
        assert!(c.score(&[5.0, 5.0, 5.0]) > 1.0);
    }

    #[test]
    fn matches_exact_feature_space_mean() {
        // Far-apart points are all kept, so the centroid is the exact mean.
        let pts = vec![vec![0.0f32, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]];
        let gamma = 0.7;
        let c = KernelCentroid::train(params(gamma), refs(&pts));
        assert_eq!(c.dictionary_len(), 3);

        let q = [0.4f32, 0.5];
        let n = pts.len() as f64;
        let mut bias = 0.0;
        for a in &pts {
            for b in &pts {
                bias += rbf(gamma, a, b) / (n * n);
            }
        }
        let cross: f64 = pts.iter().map(|p| rbf(gamma, p, &q) / n).sum();
        let want = (1.0 + bias - 2.0 * cross).sqrt();
        assert!((c.score(&q) - want).abs() < 1e-9, "got {}, want {want}", c.score(&q));
    }

    #[test]
    fn duplicates_do_not_grow_dictionary() {
        let x = vec![1.0f32, 1.0];
        let c = KernelCentroid::train(params(0.5), [x.as_slice(), x.as_slice(), x.as_slice()]);
        assert_eq!(c.dictionary_len(), 1);
        assert!(c.score(&x) < 1e-6);
    }

    #[test]
    fn dictionary_is_bounded() {
        let pts: Vec<Vec<f32>> = (0..40).map(|i| vec![i as f32 * 3.0, 0.0]).collect();
        let c = KernelCentroid::train(
            KernelParams {
                gamma: 1.0,
                tolerance: 1e-6,
                max_dictionary: 15,
            },
            refs(&pts),
        );
        assert_eq!(c.dictionary_len(), 15);
        for p in &pts {
            let s = c.score(p);
            assert!(s.is_finite() && s >= 0.0);
        }
    }

    #[test]
    fn full_dictionary_keeps_early_samples() {
        let mut pts = vec![vec![0.0f32, 0.0], vec![3.0, 0.0]];
        pts.extend((0..10).map(|_| vec![6.0f32, 0.0]));
        let c = KernelCentroid::train(
            KernelParams {
                gamma: 1.0,
                tolerance: 1e-6,
                max_dictionary: 2,
            },
            refs(&pts),
        );
        assert_eq!(c.dictionary, vec![vec![0.0f32, 0.0], vec![3.0, 0.0]]);
        // Most samples sit at (6, 0), yet the centroid stays with the first two.
        assert!(c.score(&[6.0, 0.0]) > c.score(&[0.0, 0.0]));
    }

    #[test]
    fn nan_query_is_not_a_perfect_score() {
        let x = vec![0.3f32, -1.2, 0.7];
        let c = KernelCentroid::train(params(0.5), [x.as_slice()]);
        assert!(c.score(&[f32::NAN, 0.0, 0.0]).is_nan());
    }

    #[test]
    fn well_formed_requires_finite_numbers() {
        let x = vec![0.3f32, -1.2, 0.7];
        let good = KernelCentroid::train(params(0.5), [x.as_slice()]);
        assert!(good.is_well_formed(3));
        assert!(!good.is_well_formed(4));

        let mut bad = good.clone();
        bad.alpha[0] = f64::NAN;
        assert!(!bad.is_well_formed(3));

        let mut bad = good.clone();
        bad.dictionary[0][1] = f32::INFINITY;
        assert!(!bad.is_well_formed(3));

        let mut bad = good.clone();
        bad.bias = f64::NAN;
        assert!(!bad.is_well_formed(3));

        let mut bad = good;
        bad.gamma = 0.0;
        assert!(!bad.is_well_formed(3));
    }

    #[test]
    fn outlier_does_not_dominate() {
        let mut pts: Vec<Vec<f32>> = (0..9)
            .map(|i| vec![0.05 * (i % 3) as f32, 0.05 * (i / 3) as f32])
            .collect();
        pts.push(vec![8.0, 8.0]);
        let c = KernelCentroid::train(params(0.5), refs(&pts));

        let bulk = c.score(&[0.05, 0.05]);
        let outlier = c.score(&[8.0, 8.0]);
        assert!(bulk < outlier, "bulk {bulk} should beat outlier {outlier}");
    }
}
