//! Face identity database: named face embeddings, two match strategies and
//! grouping of faces nobody has named yet.
//!
//! Embeddings come from an external recognition network (see
//! [`FaceExtractor`]); this crate only stores and compares them.
//!
//! # Usage
//!
//! ```no_run
//! use giztoy_facedb::{Config, Embedding, FaceDb, FaceSample};
//!
//! let db = FaceDb::new(Config::default());
//! db.add("alice", FaceSample::new(Embedding::new(vec![0.0; 128])?));
//!
//! // Per-identity kernel centroids, rebuilt lazily after mutations.
//! let fast = db.find_fast(&Embedding::new(vec![0.01; 128])?);
//!
//! // Every stored sample, trimmed RMS distance per identity.
//! let slow = db.find_slow(&Embedding::new(vec![0.01; 128])?);
//!
//! db.save("faces.fcdb")?;
//! # Ok::<(), giztoy_facedb::FaceDbError>(())
//! ```
//!
//! # Design
//!
//! The [`EmbeddingStore`] is the only source of truth. The [`CentroidCache`]
//! is derived from it and is rebuilt as a whole, never patched: any
//! mutation marks it dirty and the next [`FaceDb::find_fast`] refits it.
//! [`FaceDb::find_slow`] never looks at the cache.

mod cache;
mod cluster;
mod error;
mod extractor;
mod facedb;
mod kcentroid;
mod matcher;
mod normalizer;
mod persist;
mod store;
mod types;


pub use cache::{CacheEntry, CentroidCache};
pub use cluster::{
    ClusterConfig, Clustering, DEFAULT_CLUSTER_THRESHOLD, DEFAULT_MAX_ITERATIONS,
    cluster_embeddings, group_unknown_faces, group_unknown_faces_from, next_unknown_index,
    unknown_label,
};
pub use error::FaceDbError;
pub use extractor::{DetectedFace, FaceExtractor, ImageRef, extract_samples};
pub use facedb::{Config, FaceDb};
pub use kcentroid::{KernelCentroid, KernelParams};
pub use matcher::{DEFAULT_TRIM_MIN_SAMPLES, find_fast, find_slow, trimmed_rms};
pub use normalizer::VectorNormalizer;
pub use store::{EmbeddingStore, Identity};
pub use types::{EMBEDDING_DIM, Embedding, FaceSample, Match, Rect};
