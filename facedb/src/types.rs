use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::FaceDbError;

/// Length of every face embedding produced by the recognition network.
pub const EMBEDDING_DIM: usize = 128;

/// A face descriptor: exactly [`EMBEDDING_DIM`] finite values.
///
/// Length and finiteness are checked once at construction, so the rest of the crate can
/// index any two embeddings against each other without checking again.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self, FaceDbError> {
        if values.len() != EMBEDDING_DIM {
            return Err(FaceDbError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                got: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FaceDbError::NonFinite { index });
        }
        Ok(Self(values))
    }

    /// Builds an embedding from a short prefix, zero-filling the remaining
    /// dimensions. Panics if `prefix` is longer than [`EMBEDDING_DIM`].
    pub fn from_prefix(prefix: &[f32]) -> Self {
        assert!(
            prefix.len() <= EMBEDDING_DIM,
            "facedb: prefix of {} values exceeds embedding dimension",
            prefix.len()
        );
        assert!(
            prefix.iter().all(|v| v.is_finite()),
            "facedb: embedding prefix holds a non-finite value"
        );
        let mut values = vec![0.0f32; EMBEDDING_DIM];
        values[..prefix.len()].copy_from_slice(prefix);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to `other`, accumulated in f64.
    pub fn distance(&self, other: &Embedding) -> f64 {
        euclidean_distance(&self.0, &other.0)
    }
}

impl Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = FaceDbError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Embedding::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(e: Embedding) -> Self {
        e.0
    }
}

impl fmt::Debug for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedding")
            .field("head", &&self.0[..4])
            .field("len", &self.0.len())
            .finish()
    }
}

/// Squared Euclidean distance between equal-length slices.
pub(crate) fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut sum: f64 = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = *x as f64 - *y as f64;
        sum += d * d;
    }
    sum
}

pub(crate) fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Where a face was found in its source image, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One observed face.
///
/// `name` is the identity the sample is filed under (empty when unnamed).
/// It is the only field that changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub embedding: Embedding,

    #[serde(default)]
    pub rect: Rect,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl FaceSample {
    pub fn new(embedding: Embedding) -> Self {
        Self {
            embedding,
            rect: Rect::default(),
            image_id: String::new(),
            name: String::new(),
        }
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = image_id.into();
        self
    }
}

/// Result of a successful match: the winning identity and its score.
/// Lower scores mean closer.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub name: String,
    pub score: f64,
}
