use tracing::warn;

use crate::types::{Embedding, FaceSample, Rect};
use crate::FaceDbError;

/// Borrowed raw pixels handed to a [`FaceExtractor`].
///
/// Interleaved 8-bit RGB, row-major, `stride` bytes per row.
#[derive(Debug, Clone, Copy)]
pub struct ImageRef<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> ImageRef<'a> {
    /// Wraps tightly packed RGB pixels (`stride = width * 3`).
    pub fn rgb(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 3,
            data,
        }
    }
}

/// One face found by an extractor.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    /// Raw network output; checked against [`crate::EMBEDDING_DIM`] by
    /// [`extract_samples`].
    pub embedding: Vec<f32>,
    pub rect: Rect,
}

/// Finds faces in an image and computes their embeddings.
///
/// Wraps the detector, landmark predictor and recognition network, none of
/// which the database needs to know about. Implementations may block for a
/// long time; call them outside any database lock.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait FaceExtractor: Send + Sync {
    fn detect(&self, image: &ImageRef<'_>) -> Result<Vec<DetectedFace>, FaceDbError>;
}

/// Runs `extractor` over `image` and returns unnamed samples tagged with
/// `image_id`. A failed detection, or one that finds nothing, yields an
/// empty list. Faces with a malformed embedding are dropped.
pub fn extract_samples(
    extractor: &dyn FaceExtractor,
    image: &ImageRef<'_>,
    image_id: &str,
) -> Vec<FaceSample> {
    let detected = match extractor.detect(image) {
        Ok(d) => d,
        Err(e) => {
            warn!(image_id, error = %e, "facedb: face extraction failed");
            return Vec::new();
        }
    };

    detected
        .into_iter()
        .filter_map(|d| match Embedding::new(d.embedding) {
            Ok(embedding) => Some(
                FaceSample::new(embedding)
                    .with_rect(d.rect)
                    .with_image_id(image_id),
            ),
            Err(e) => {
                warn!(image_id, error = %e, "facedb: dropping detected face");
                None
            }
        })
        .collect()
}
