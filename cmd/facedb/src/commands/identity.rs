//! Commands on named identities.

use clap::{Args, ValueEnum};
use serde::Serialize;

use super::{load_samples, open_db, output_result, print_success, print_warning};
use crate::Cli;

/// Add faces from a file to an identity.
#[derive(Args)]
pub struct AddCommand {
    /// Identity name
    #[arg(long)]
    name: String,
    /// Faces file (JSON or YAML)
    #[arg(long)]
    input: String,
}

impl AddCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let samples = load_samples(&self.input)?;
        if samples.is_empty() {
            print_warning(&format!("no faces in {}", self.input));
            return Ok(());
        }

        let database = open_db(cli)?;
        let n = samples.len();
        for s in samples {
            database.db.add(&self.name, s);
        }
        database.save()?;
        print_success(&format!("added {n} face(s) to '{}'", self.name));
        Ok(())
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Kernel centroid per identity
    Fast,
    /// Trimmed distance over every stored face
    Slow,
}

/// Find the closest identity for each face in a file.
#[derive(Args)]
pub struct IdentifyCommand {
    /// Faces file (JSON or YAML)
    #[arg(long)]
    input: String,
    /// Match strategy
    #[arg(long, value_enum, default_value_t = Strategy::Fast)]
    strategy: Strategy,
}

#[derive(Serialize)]
struct IdentifyResult {
    image_id: String,
    /// `None` when the database is empty.
    name: Option<String>,
    score: Option<f64>,
}

impl IdentifyCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let samples = load_samples(&self.input)?;
        let database = open_db(cli)?;

        let results: Vec<IdentifyResult> = samples
            .iter()
            .map(|s| {
                let m = match self.strategy {
                    Strategy::Fast => database.db.find_fast(&s.embedding),
                    Strategy::Slow => database.db.find_slow(&s.embedding),
                };
                IdentifyResult {
                    image_id: s.image_id.clone(),
                    name: m.as_ref().map(|m| m.name.clone()),
                    score: m.map(|m| m.score),
                }
            })
            .collect();

        if results.iter().all(|r| r.name.is_none()) && !results.is_empty() {
            print_warning("no match: database is empty");
        }
        output_result(&results, cli.json)
    }
}

/// Rename an identity. An existing target name absorbs its faces.
#[derive(Args)]
pub struct RenameCommand {
    /// Current name
    old: String,
    /// New name
    new: String,
}

impl RenameCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let database = open_db(cli)?;
        let merging = database.db.names().contains(&self.new);
        if !database.db.rename(&self.old, &self.new) {
            anyhow::bail!("identity '{}' not found", self.old);
        }
        database.save()?;
        if merging {
            print_success(&format!("merged '{}' into '{}'", self.old, self.new));
        } else {
            print_success(&format!("renamed '{}' to '{}'", self.old, self.new));
        }
        Ok(())
    }
}

/// Delete an identity and all its faces.
#[derive(Args)]
pub struct DeleteCommand {
    /// Identity name
    name: String,
}

impl DeleteCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let database = open_db(cli)?;
        if !database.db.delete_identity(&self.name) {
            anyhow::bail!("identity '{}' not found", self.name);
        }
        database.save()?;
        print_success(&format!("deleted '{}'", self.name));
        Ok(())
    }
}

/// List identities with their sample counts.
#[derive(Args)]
pub struct ListCommand {}

#[derive(Serialize)]
struct ListEntry {
    name: String,
    samples: usize,
}

impl ListCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let database = open_db(cli)?;
        let entries: Vec<ListEntry> = database
            .db
            .names()
            .into_iter()
            .map(|name| ListEntry {
                samples: database.db.samples_for(&name).len(),
                name,
            })
            .collect();
        output_result(&entries, cli.json)
    }
}

/// Show database statistics.
#[derive(Args)]
pub struct InfoCommand {}

#[derive(Serialize)]
struct Info {
    database: String,
    identities: usize,
    samples: usize,
    unknown: usize,
    cache_current: bool,
}

impl InfoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let database = open_db(cli)?;
        let info = Info {
            database: database.path.display().to_string(),
            identities: database.db.identity_count(),
            samples: database.db.sample_count(),
            unknown: database.db.unknown_faces().len(),
            cache_current: !database.db.is_dirty(),
        };
        output_result(&info, cli.json)
    }
}
