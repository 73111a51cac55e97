//! `structdiff`: diff two JSON documents.
//!
//! Usage:
//!   structdiff diff <from.json> <to.json> [--schema schema.json] [--type T]
//!   structdiff changes <from.json> <to.json> [--schema schema.json] [--type T]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use structdiff::cli::{self, Inputs};

#[derive(Parser)]
#[command(name = "structdiff")]
#[command(about = "Structural diff of JSON documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DiffArgs {
    /// Old document
    from: PathBuf,

    /// New document
    to: PathBuf,

    /// JSON array of schema type definitions
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Schema type of the documents (defaults to their `_type`)
    #[arg(short = 't', long = "type")]
    type_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the diff tree
    Diff(DiffArgs),
    /// Print the flattened change list with revert patches
    Changes(DiffArgs),
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load(args: &DiffArgs) -> Result<Inputs> {
    let from = read(&args.from)?;
    let to = read(&args.to)?;
    let schema = args.schema.as_deref().map(read).transpose()?;
    Ok(Inputs::parse(&from, &to, schema.as_deref(), args.type_name.as_deref())?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = match &cli.command {
        Commands::Diff(args) => cli::diff(&load(args)?)?,
        Commands::Changes(args) => cli::changes(&load(args)?)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
