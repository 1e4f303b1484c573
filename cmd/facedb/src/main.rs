//! facedb CLI - manage a face identity database file.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{
    AddCommand, DeleteCommand, GroupCommand, IdentifyCommand, InfoCommand, ListCommand,
    RenameCommand, UnknownCommand,
};

/// facedb CLI - a command line interface for the face identity database.
///
/// Faces are given as precomputed 128-d embeddings in a JSON or YAML file:
/// a list of `{embedding: [...], rect: {x, y, width, height}, image_id}`,
/// where `rect` and `image_id` are optional.
///
/// Configuration is read from ~/.giztoy/facedb/config.yaml.
#[derive(Parser)]
#[command(name = "facedb")]
#[command(about = "Face identity database CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.giztoy/facedb/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Database file (overrides config file)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output as JSON (default: YAML)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add faces to an identity
    Add(AddCommand),
    /// Find the closest identity for each face
    Identify(IdentifyCommand),
    /// Rename an identity (merges into an existing name)
    Rename(RenameCommand),
    /// Delete an identity and its faces
    Delete(DeleteCommand),
    /// List identities with sample counts
    List(ListCommand),
    /// Show database statistics
    Info(InfoCommand),
    /// Manage faces that have no identity yet
    Unknown(UnknownCommand),
    /// Cluster faces from a file without touching the database
    Group(GroupCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Add(cmd) => cmd.run(&cli),
        Commands::Identify(cmd) => cmd.run(&cli),
        Commands::Rename(cmd) => cmd.run(&cli),
        Commands::Delete(cmd) => cmd.run(&cli),
        Commands::List(cmd) => cmd.run(&cli),
        Commands::Info(cmd) => cmd.run(&cli),
        Commands::Unknown(cmd) => cmd.run(&cli),
        Commands::Group(cmd) => cmd.run(&cli),
    }
}
