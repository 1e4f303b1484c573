//! Faces waiting for a name.

use clap::{Args, Subcommand};
use serde::Serialize;

use super::{load_samples, open_db, open_db_with, output_result, override_cluster, print_success};
use crate::Cli;

/// Manage faces that have no identity yet.
#[derive(Args)]
pub struct UnknownCommand {
    #[command(subcommand)]
    command: UnknownSubcommand,
}

#[derive(Subcommand)]
enum UnknownSubcommand {
    /// Queue faces from a file
    Add {
        /// Faces file (JSON or YAML)
        #[arg(long)]
        input: String,
    },
    /// Label queued faces "Unknown N" by cluster
    Group {
        /// Link faces closer than this distance
        #[arg(long)]
        threshold: Option<f64>,
        /// Seed for a reproducible grouping
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Move labelled faces into the database under their labels
    Commit,
    /// Show queued faces
    List,
}

#[derive(Serialize)]
struct UnknownEntry {
    label: String,
    image_id: String,
}

impl UnknownCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            UnknownSubcommand::Add { input } => {
                let samples = load_samples(input)?;
                let database = open_db(cli)?;
                let n = samples.len();
                for s in samples {
                    database.db.add_unknown(s);
                }
                database.save()?;
                print_success(&format!("queued {n} unknown face(s)"));
                Ok(())
            }
            UnknownSubcommand::Group { threshold, seed } => {
                let database = open_db_with(cli, |cfg| {
                    override_cluster(&mut cfg.cluster, *threshold, *seed)
                })?;
                let n = database.db.cluster_unknown();
                database.save()?;
                print_success(&format!(
                    "grouped {} face(s) into {n} cluster(s)",
                    database.db.unknown_faces().len()
                ));
                Ok(())
            }
            UnknownSubcommand::Commit => {
                let database = open_db(cli)?;
                if database.db.unknown_faces().iter().any(|f| f.name.is_empty()) {
                    anyhow::bail!("unlabelled faces in queue, run 'facedb unknown group' first");
                }
                let faces = database.db.take_unknown();
                let n = faces.len();
                for face in faces {
                    let name = face.name.clone();
                    database.db.add(&name, face);
                }
                database.save()?;
                print_success(&format!("committed {n} face(s)"));
                Ok(())
            }
            UnknownSubcommand::List => {
                let database = open_db(cli)?;
                let entries: Vec<UnknownEntry> = database
                    .db
                    .unknown_faces()
                    .into_iter()
                    .map(|f| UnknownEntry {
                        label: f.name,
                        image_id: f.image_id,
                    })
                    .collect();
                output_result(&entries, cli.json)
            }
        }
    }
}
