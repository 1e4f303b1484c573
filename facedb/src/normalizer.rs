use serde::{Deserialize, Serialize};

use crate::types::EMBEDDING_DIM;

/// Per-dimension standardization: `(x - mean) * inv_std`.
///
/// Fit over every stored embedding before the centroid cache is trained, so
/// that dimensions with a large spread do not dominate the kernel.
/// A dimension with no spread gets `inv_std = 0` and normalizes to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorNormalizer {
    mean: Vec<f64>,
    inv_std: Vec<f64>,
}

impl Default for VectorNormalizer {
    fn default() -> Self {
        Self {
            mean: vec![0.0; EMBEDDING_DIM],
            inv_std: vec![1.0; EMBEDDING_DIM],
        }
    }
}

impl VectorNormalizer {
    /// Fits mean and sample standard deviation (n - 1) over `samples`.
    /// With fewer than two samples every inverse deviation is 0.
    pub fn fit<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut count = 0usize;
        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        let mut sum_sq = vec![0.0f64; EMBEDDING_DIM];
        let mut rows: Vec<&[f32]> = Vec::new();

        for s in samples {
            for (d, &v) in s.iter().enumerate().take(EMBEDDING_DIM) {
                sum[d] += v as f64;
            }
            rows.push(s);
            count += 1;
        }

        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();

        // Second pass on centered values; cheaper on precision than sum of squares.
        for row in &rows {
            for (d, &v) in row.iter().enumerate().take(EMBEDDING_DIM) {
                let c = v as f64 - mean[d];
                sum_sq[d] += c * c;
            }
        }

        let inv_std = sum_sq
            .iter()
            .map(|&ss| {
                if count < 2 {
                    return 0.0;
                }
                let var = ss / (n - 1.0);
                if var > 0.0 { 1.0 / var.sqrt() } else { 0.0 }
            })
            .collect();

        Self { mean, inv_std }
    }

    /// Returns the standardized copy of `v`.
    pub fn apply(&self, v: &[f32]) -> Vec<f32> {
        v.iter()
            .zip(self.mean.iter().zip(self.inv_std.iter()))
            .map(|(&x, (&m, &s))| ((x as f64 - m) * s) as f32)
            .collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn inv_std(&self) -> &[f64] {
        &self.inv_std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    #[test]
    fn standardizes_each_dimension() {
        let a = Embedding::from_prefix(&[1.0, 10.0]);
        let b = Embedding::from_prefix(&[3.0, 30.0]);
        let norm = VectorNormalizer::fit([a.as_slice(), b.as_slice()]);

        assert!((norm.mean()[0] - 2.0).abs() < 1e-9);
        assert!((norm.mean()[1] - 20.0).abs() < 1e-9);

        // Sample std of {1, 3} is sqrt(2).
        let out = norm.apply(&a);
        let expect = -1.0 / 2.0f32.sqrt();
        assert!((out[0] - expect).abs() < 1e-6, "got {}", out[0]);
        assert!((out[1] - expect).abs() < 1e-6, "got {}", out[1]);
    }

    #[test]
    fn constant_dimension_maps_to_zero() {
        let a = Embedding::from_prefix(&[1.0, 5.0]);
        let b = Embedding::from_prefix(&[2.0, 5.0]);
        let norm = VectorNormalizer::fit([a.as_slice(), b.as_slice()]);
        let out = norm.apply(&b);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[100], 0.0);
    }

    #[test]
    fn single_sample_collapses() {
        let a = Embedding::from_prefix(&[4.0, -2.0]);
        let norm = VectorNormalizer::fit([a.as_slice()]);
        assert!(norm.apply(&a).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_fit_is_identity() {
        let norm = VectorNormalizer::fit(std::iter::empty::<&[f32]>());
        let a = Embedding::from_prefix(&[0.25, -1.5]);
        assert_eq!(norm.apply(&a), a.as_slice());
    }
}
