use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CentroidCache;
use crate::cluster::{self, ClusterConfig};
use crate::kcentroid::KernelParams;
use crate::matcher::{self, DEFAULT_TRIM_MIN_SAMPLES};
use crate::persist;
use crate::store::EmbeddingStore;
use crate::types::{Embedding, FaceSample, Match};
use crate::FaceDbError;

/// Configuration for a [`FaceDb`]. Zero values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RBF width of the centroid kernel. Default: 0.001.
    pub kernel_gamma: f64,

    /// Dictionary admission tolerance. Default: 1e-6.
    pub kernel_tolerance: f64,

    /// Dictionary vectors kept per centroid. Default: 15.
    pub max_dictionary: usize,

    /// Slow matching trims distances to their middle half above this count.
    /// Default: 15.
    pub trim_min_samples: usize,

    /// Unknown-face clustering.
    pub cluster: ClusterConfig,
}

impl Default for Config {
    fn default() -> Self {
        let kp = KernelParams::default();
        Self {
            kernel_gamma: kp.gamma,
            kernel_tolerance: kp.tolerance,
            max_dictionary: kp.max_dictionary,
            trim_min_samples: DEFAULT_TRIM_MIN_SAMPLES,
            cluster: ClusterConfig::default(),
        }
    }
}

impl Config {
    fn with_defaults(mut self) -> Self {
        let kp = KernelParams::default();
        if self.kernel_gamma <= 0.0 {
            self.kernel_gamma = kp.gamma;
        }
        if self.kernel_tolerance <= 0.0 {
            self.kernel_tolerance = kp.tolerance;
        }
        if self.max_dictionary == 0 {
            self.max_dictionary = kp.max_dictionary;
        }
        if self.trim_min_samples == 0 {
            self.trim_min_samples = DEFAULT_TRIM_MIN_SAMPLES;
        }
        self.cluster = self.cluster.with_defaults();
        self
    }

    pub fn kernel_params(&self) -> KernelParams {
        KernelParams {
            gamma: self.kernel_gamma,
            tolerance: self.kernel_tolerance,
            max_dictionary: self.max_dictionary,
        }
    }
}

struct Inner {
    store: EmbeddingStore,
    cache: CentroidCache,
    /// Set by every mutation; cleared only by a rebuild or by loading a file
    /// whose cache covers its store.
    dirty: bool,
    unknown: Vec<FaceSample>,
}

impl Inner {
    fn rebuild(&mut self, params: KernelParams) {
        self.cache = CentroidCache::build(&self.store, params);
        self.dirty = false;
    }
}

/// Face identity database.
///
/// Owns the embedding store, the centroid cache derived from it, and the
/// faces still waiting for a name. Every mutation marks the cache dirty;
/// [`FaceDb::find_fast`] rebuilds it before use.
///
/// Thread-safe: all methods can be called concurrently.
pub struct FaceDb {
    cfg: Config,
    inner: RwLock<Inner>,
}

impl FaceDb {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg: cfg.with_defaults(),
            inner: RwLock::new(Inner {
                store: EmbeddingStore::new(),
                cache: CentroidCache::default(),
                dirty: true,
                unknown: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // ---- Store ----

    /// Files `sample` under `name`, creating the identity when absent.
    pub fn add(&self, name: &str, sample: FaceSample) {
        let mut inner = self.inner.write();
        inner.store.add(name, sample);
        inner.dirty = true;
    }

    /// Renames an identity. If `new` already exists the two are merged.
    /// Returns false if `old` does not exist.
    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut inner = self.inner.write();
        let changed = inner.store.rename(old, new);
        if changed {
            inner.dirty = true;
        }
        changed
    }

    /// Removes an identity and all its samples.
    pub fn delete_identity(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.store.delete_identity(name);
        if removed {
            inner.dirty = true;
        }
        removed
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().store.names()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.read().store.sample_count()
    }

    pub fn identity_count(&self) -> usize {
        self.inner.read().store.identity_count()
    }

    pub fn samples_for(&self, name: &str) -> Vec<FaceSample> {
        self.inner.read().store.samples_for(name).to_vec()
    }

    // ---- Cache ----

    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Refits the normalizer and every centroid from the current store.
    pub fn rebuild_cache(&self) {
        self.inner.write().rebuild(self.cfg.kernel_params());
    }

    /// Identity names the cache currently holds centroids for.
    pub fn cache_names(&self) -> Vec<String> {
        self.inner.read().cache.names()
    }

    // ---- Matching ----

    /// Matches against the centroid cache, rebuilding it first if dirty.
    pub fn find_fast(&self, query: &Embedding) -> Option<Match> {
        let inner = self.inner.read();
        if !inner.dirty {
            return matcher::find_fast(&inner.cache, query);
        }
        drop(inner);

        let mut inner = self.inner.write();
        if inner.dirty {
            inner.rebuild(self.cfg.kernel_params());
        }
        let inner = RwLockWriteGuard::downgrade(inner);
        matcher::find_fast(&inner.cache, query)
    }

    /// Matches against every stored sample. Never touches the cache.
    pub fn find_slow(&self, query: &Embedding) -> Option<Match> {
        let inner = self.inner.read();
        matcher::find_slow(&inner.store, query, self.cfg.trim_min_samples)
    }

    // ---- Unknown faces ----

    /// Queues a face that matched nobody.
    pub fn add_unknown(&self, sample: FaceSample) {
        self.inner.write().unknown.push(sample);
    }

    pub fn unknown_faces(&self) -> Vec<FaceSample> {
        self.inner.read().unknown.clone()
    }

    /// Labels queued unknown faces `"Unknown {i}"` by cluster. Numbering
    /// starts past every `"Unknown {i}"` identity already stored, so a new
    /// batch never lands in an earlier batch's identity. Returns the number of
    /// clusters.
    pub fn cluster_unknown(&self) -> usize {
        let mut inner = self.inner.write();
        let first = cluster::next_unknown_index(
            inner.store.identities().iter().map(|i| i.name.as_str()),
        );
        cluster::group_unknown_faces_from(&mut inner.unknown, &self.cfg.cluster, first)
    }

    /// Drains the unknown-face queue.
    pub fn take_unknown(&self) -> Vec<FaceSample> {
        std::mem::take(&mut self.inner.write().unknown)
    }

    // ---- Persistence ----

    /// Writes the database. The cache is included only when it is current.
    pub fn save_to(&self, w: &mut dyn Write) -> Result<(), FaceDbError> {
        let inner = self.inner.read();
        let cache = (!inner.dirty).then_some(&inner.cache);
        persist::save(w, &inner.store, &inner.unknown, cache)?;
        debug!(
            identities = inner.store.identity_count(),
            samples = inner.store.sample_count(),
            cached = cache.is_some(),
            "facedb: saved"
        );
        Ok(())
    }

    /// Writes the database to `path` through a sibling `<path>.tmp` file, so a
    /// failed save never truncates an existing database. The temp file is
    /// removed if the save fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FaceDbError> {
        let path = path.as_ref();
        let tmp = temp_path(path);

        let written = File::create(&tmp)
            .map_err(FaceDbError::from)
            .and_then(|mut f| {
                self.save_to(&mut f)?;
                f.sync_all()?;
                Ok(())
            })
            .and_then(|()| fs::rename(&tmp, path).map_err(FaceDbError::from));

        if let Err(e) = written {
            if let Err(rm) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %rm, "facedb: temp file not removed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Replaces the database contents with what `r` holds. On any error the
    /// current contents are left untouched.
    pub fn load_from(&self, r: &mut dyn Read) -> Result<(), FaceDbError> {
        let loaded = persist::load(r)?;

        let (cache, dirty) = match loaded.cache {
            Some(c) if c.covers(&loaded.store) => (c, false),
            Some(_) => {
                warn!("facedb: discarding cache that does not match stored identities");
                (CentroidCache::default(), true)
            }
            None => (CentroidCache::default(), true),
        };

        let mut inner = self.inner.write();
        inner.store = loaded.store;
        inner.unknown = loaded.unknown;
        inner.cache = cache;
        inner.dirty = dirty;
        debug!(
            identities = inner.store.identity_count(),
            samples = inner.store.sample_count(),
            unknown = inner.unknown.len(),
            dirty,
            "facedb: loaded"
        );
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), FaceDbError> {
        let mut f = File::open(path)?;
        self.load_from(&mut f)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl Default for FaceDb {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(x: f32) -> Embedding {
        Embedding::from_prefix(&[x])
    }

    fn test_db() -> FaceDb {
        FaceDb::new(Config {
            kernel_gamma: 0.5,
            ..Config::default()
        })
    }

    #[test]
    fn config_zero_values_get_defaults() {
        let cfg = Config {
            kernel_gamma: 0.0,
            kernel_tolerance: 0.0,
            max_dictionary: 0,
            trim_min_samples: 0,
            cluster: ClusterConfig {
                threshold: 0.0,
                max_iterations: 0,
                seed: Some(7),
            },
        }
        .with_defaults();

        assert_eq!(cfg.kernel_gamma, 0.001);
        assert_eq!(cfg.kernel_tolerance, 1e-6);
        assert_eq!(cfg.max_dictionary, 15);
        assert_eq!(cfg.trim_min_samples, 15);
        assert_eq!(cfg.cluster.threshold, 0.5);
        assert_eq!(cfg.cluster.max_iterations, 100);
        assert_eq!(cfg.cluster.seed, Some(7));
    }

    #[test]
    fn config_from_partial_json() {
        let cfg: Config = serde_json::from_str(r#"{"trim_min_samples": 20}"#).unwrap();
        assert_eq!(cfg.trim_min_samples, 20);
        assert_eq!(cfg.max_dictionary, 15);
        assert_eq!(cfg.cluster, ClusterConfig::default());
    }

    #[test]
    fn new_database_is_dirty_and_empty() {
        let db = FaceDb::default();
        assert!(db.is_dirty());
        assert_eq!(db.identity_count(), 0);
        assert!(db.find_fast(&emb(0.0)).is_none());
        assert!(db.find_slow(&emb(0.0)).is_none());
    }

    #[test]
    fn mutations_mark_dirty() {
        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)));
        db.rebuild_cache();
        assert!(!db.is_dirty());

        db.add("bob", FaceSample::new(emb(3.0)));
        assert!(db.is_dirty());
        db.rebuild_cache();

        assert!(db.rename("bob", "carol"));
        assert!(db.is_dirty());
        db.rebuild_cache();

        assert!(db.delete_identity("carol"));
        assert!(db.is_dirty());
        db.rebuild_cache();

        assert!(!db.rename("nobody", "x"));
        assert!(!db.delete_identity("nobody"));
        assert!(!db.is_dirty());
    }

    #[test]
    fn find_fast_rebuilds_lazily() {
        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)));
        db.add("bob", FaceSample::new(emb(3.0)));
        assert!(db.cache_names().is_empty());

        let m = db.find_fast(&emb(2.9)).unwrap();
        assert_eq!(m.name, "bob");
        assert!(!db.is_dirty());
        assert_eq!(db.cache_names(), db.names());
    }

    #[test]
    fn find_slow_ignores_cache() {
        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)));
        db.add("bob", FaceSample::new(emb(3.0)));
        let m = db.find_slow(&emb(0.2)).unwrap();
        assert_eq!(m.name, "alice");
        assert!((m.score - 0.2).abs() < 1e-6);
        assert!(db.is_dirty());
    }

    #[test]
    fn samples_for_returns_copies() {
        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)).with_image_id("1.jpg"));
        let samples = db.samples_for("alice");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "alice");
        assert_eq!(samples[0].image_id, "1.jpg");
        assert!(db.samples_for("bob").is_empty());
    }

    #[test]
    fn unknown_faces_cluster_and_drain() {
        let db = FaceDb::new(Config {
            cluster: ClusterConfig {
                seed: Some(11),
                ..ClusterConfig::default()
            },
            ..Config::default()
        });
        for x in [0.0, 0.1, 4.0] {
            db.add_unknown(FaceSample::new(emb(x)));
        }
        assert_eq!(db.cluster_unknown(), 2);

        let names: Vec<String> = db.unknown_faces().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Unknown 0", "Unknown 0", "Unknown 1"]);

        let taken = db.take_unknown();
        assert_eq!(taken.len(), 3);
        assert!(db.unknown_faces().is_empty());
    }

    #[test]
    fn unknown_labels_continue_past_stored_ones() {
        let db = FaceDb::new(Config {
            cluster: ClusterConfig {
                seed: Some(2),
                ..ClusterConfig::default()
            },
            ..Config::default()
        });
        db.add("Unknown 0", FaceSample::new(emb(0.0)));
        db.add("Unknown 3", FaceSample::new(emb(5.0)));
        db.add("Unknown x", FaceSample::new(emb(9.0)));

        db.add_unknown(FaceSample::new(emb(0.05)));
        db.add_unknown(FaceSample::new(emb(20.0)));
        assert_eq!(db.cluster_unknown(), 2);

        let names: Vec<String> = db.unknown_faces().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Unknown 4", "Unknown 5"]);
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("/d/faces.fcdb")), Path::new("/d/faces.fcdb.tmp"));
        assert_eq!(temp_path(Path::new("/d/faces.tmp")), Path::new("/d/faces.tmp.tmp"));
        assert_ne!(temp_path(Path::new("faces.db")), temp_path(Path::new("faces.fcdb")));
    }

    #[test]
    fn save_to_tmp_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.tmp");

        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)));
        db.save(&path).unwrap();

        let loaded = test_db();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.names(), vec!["alice"]);

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "temp file left behind");
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a directory fails after the temp file is written.
        let target = dir.path().join("faces.fcdb");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();

        let db = test_db();
        db.add("alice", FaceSample::new(emb(0.0)));
        let err = db.save(&target).unwrap_err();
        assert!(matches!(err, FaceDbError::Io(_)));
        assert!(!temp_path(&target).exists());
    }
}
