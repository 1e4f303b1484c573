//! One-shot clustering of a faces file.

use clap::Args;
use giztoy_facedb::group_unknown_faces;
use serde::Serialize;

use super::{get_config, load_samples, output_result, override_cluster};
use crate::Cli;

/// Cluster faces from a file and print their labels. The database is not
/// opened.
#[derive(Args)]
pub struct GroupCommand {
    /// Faces file (JSON or YAML)
    #[arg(long)]
    input: String,
    /// Link faces closer than this distance
    #[arg(long)]
    threshold: Option<f64>,
    /// Seed for a reproducible grouping
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct GroupResult {
    clusters: usize,
    faces: Vec<GroupedFace>,
}

#[derive(Serialize)]
struct GroupedFace {
    label: String,
    image_id: String,
}

impl GroupCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cluster = get_config(cli)?.facedb.cluster;
        override_cluster(&mut cluster, self.threshold, self.seed);

        let mut faces = load_samples(&self.input)?;
        let clusters = group_unknown_faces(&mut faces, &cluster);

        let result = GroupResult {
            clusters,
            faces: faces
                .into_iter()
                .map(|f| GroupedFace {
                    label: f.name,
                    image_id: f.image_id,
                })
                .collect(),
        };
        output_result(&result, cli.json)
    }
}
