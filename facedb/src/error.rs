use thiserror::Error;

/// Errors returned by facedb operations.
///
/// Matching never fails: an empty database or an identity without usable
/// distances is logged and reported as "no match" instead.
#[derive(Debug, Error)]
pub enum FaceDbError {
    #[error("facedb: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("facedb: non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("facedb: io: {0}")]
    Io(String),

    #[error("facedb: invalid format: {0}")]
    InvalidFormat(String),

    #[error("facedb: unsupported version {got} (want {want})")]
    UnsupportedVersion { got: u32, want: u32 },

    #[error("facedb: encode: {0}")]
    Encode(String),

    #[error("facedb: decode: {0}")]
    Decode(String),

    #[error("facedb: inconsistent state: {0}")]
    InconsistentState(String),

    #[error("facedb: extractor: {0}")]
    Extractor(String),
}

impl FaceDbError {
    /// Reports whether the error came from saving or loading a database file.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            FaceDbError::Io(_)
                | FaceDbError::InvalidFormat(_)
                | FaceDbError::UnsupportedVersion { .. }
                | FaceDbError::Encode(_)
                | FaceDbError::Decode(_)
        )
    }
}

impl From<std::io::Error> for FaceDbError {
    fn from(e: std::io::Error) -> Self {
        FaceDbError::Io(e.to_string())
    }
}
