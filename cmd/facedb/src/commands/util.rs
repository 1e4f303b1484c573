//! Utility functions for CLI commands.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use giztoy_facedb::{ClusterConfig, Embedding, FaceDb, FaceSample, Rect};
use serde::Deserialize;

use crate::Cli;
use crate::config::{Config, load_config};

/// One face as written in an input file.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub image_id: Option<String>,
}

impl SampleInput {
    pub fn into_sample(self) -> anyhow::Result<FaceSample> {
        let mut sample = FaceSample::new(Embedding::new(self.embedding)?);
        if let Some(rect) = self.rect {
            sample = sample.with_rect(rect);
        }
        if let Some(id) = self.image_id {
            sample = sample.with_image_id(id);
        }
        Ok(sample)
    }
}

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// An opened database and where it lives.
pub struct Database {
    pub db: FaceDb,
    pub path: PathBuf,
}

impl Database {
    /// Writes the database back, creating its directory if needed.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.db
            .save(&self.path)
            .with_context(|| format!("saving {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "saved database");
        Ok(())
    }
}

/// Opens the configured database. A missing file gives an empty database.
pub fn open_db(cli: &Cli) -> anyhow::Result<Database> {
    open_db_with(cli, |_| {})
}

/// Opens the configured database after letting `tweak` adjust the settings.
pub fn open_db_with(cli: &Cli, tweak: impl FnOnce(&mut giztoy_facedb::Config)) -> anyhow::Result<Database> {
    let cfg = get_config(cli)?;
    let path = cfg.database_path(cli.db.as_deref())?;
    let mut settings = cfg.facedb;
    tweak(&mut settings);

    let db = FaceDb::new(settings);
    if path.exists() {
        db.load(&path)
            .with_context(|| format!("loading {}", path.display()))?;
    } else {
        print_verbose(cli, &format!("{} does not exist, starting empty", path.display()));
    }
    Ok(Database { db, path })
}

/// Applies `--threshold` / `--seed` overrides to a cluster config.
pub fn override_cluster(cfg: &mut ClusterConfig, threshold: Option<f64>, seed: Option<u64>) {
    if let Some(t) = threshold {
        cfg.threshold = t;
    }
    if seed.is_some() {
        cfg.seed = seed;
    }
}

/// Loads faces from a YAML or JSON file.
pub fn load_samples(path: &str) -> anyhow::Result<Vec<FaceSample>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json");

    let inputs: Vec<SampleInput> = match ext.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            input
                .into_sample()
                .with_context(|| format!("{path}: face #{i}"))
        })
        .collect()
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)?
    } else {
        serde_yaml::to_string(result)?
    };
    println!("{}", output.trim_end());
    Ok(())
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    if cli.verbose {
        eprintln!("[verbose] {}", msg);
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_input_optional_fields() {
        let inputs: Vec<SampleInput> = serde_json::from_str(&format!(
            r#"[{{"embedding": {e}}}, {{"embedding": {e}, "rect": {{"x":1,"y":2,"width":3,"height":4}}, "image_id": "a.jpg"}}]"#,
            e = serde_json::to_string(&vec![0.5f32; 128]).unwrap()
        ))
        .unwrap();

        let samples: Vec<FaceSample> = inputs
            .into_iter()
            .map(|i| i.into_sample().unwrap())
            .collect();
        assert_eq!(samples[0].rect, Rect::default());
        assert!(samples[0].image_id.is_empty());
        assert_eq!(samples[1].rect, Rect::new(1, 2, 3, 4));
        assert_eq!(samples[1].image_id, "a.jpg");
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let input = SampleInput {
            embedding: vec![0.0; 3],
            rect: None,
            image_id: None,
        };
        assert!(input.into_sample().is_err());
    }

    #[test]
    fn load_samples_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.yaml");
        let emb = serde_json::to_string(&vec![0.1f32; 128]).unwrap();
        std::fs::write(&path, format!("- embedding: {emb}\n  image_id: x.jpg\n")).unwrap();

        let samples = load_samples(path.to_str().unwrap()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].image_id, "x.jpg");
    }

    #[test]
    fn cluster_overrides() {
        let mut cfg = ClusterConfig::default();
        override_cluster(&mut cfg, None, None);
        assert_eq!(cfg, ClusterConfig::default());
        override_cluster(&mut cfg, Some(0.3), Some(9));
        assert_eq!(cfg.threshold, 0.3);
        assert_eq!(cfg.seed, Some(9));
    }
}
