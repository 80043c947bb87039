use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::schema::FieldType;

#[derive(Debug, Parser)]
#[command(author, version, about = "Import CSV data into record collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Propose a field type per CSV column for review
    Probe(ProbeArgs),
    /// Create a collection from a CSV file and import its rows
    Create(CreateArgs),
    /// Upsert CSV rows into an existing collection, matched by title
    Import(ImportArgs),
    /// List the collections held in a store file
    Collections(CollectionsArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Write the proposed type assignment to this YAML file for editing
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Input CSV file ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// JSON store file holding collections and records
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// Name of the collection to create
    #[arg(short = 'n', long = "name")]
    pub name: String,
    /// Reviewed type assignment produced by `probe -o`
    #[arg(short = 't', long = "types")]
    pub types: Option<PathBuf>,
    /// Override a column type with `header=type` (repeatable)
    #[arg(long = "type", value_parser = parse_type_override, action = clap::ArgAction::Append)]
    pub type_overrides: Vec<(String, FieldType)>,
    #[command(flatten)]
    pub tuning: ImportTuning,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input CSV file ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// JSON store file holding collections and records
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// Target collection id
    #[arg(short = 'c', long = "collection", conflicts_with = "name", required_unless_present = "name")]
    pub collection: Option<String>,
    /// Target collection name
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,
    #[command(flatten)]
    pub tuning: ImportTuning,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportTuning {
    /// Rows processed between pauses
    #[arg(long = "batch-size", default_value_t = crate::engine::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Pause between batches in milliseconds
    #[arg(long = "batch-pause-ms", default_value_t = 10)]
    pub batch_pause_ms: u64,
}

#[derive(Debug, Args)]
pub struct CollectionsArgs {
    /// JSON store file holding collections and records
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
}

pub fn parse_type_override(value: &str) -> Result<(String, FieldType), String> {
    let (header, kind) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("Expected header=type, got '{value}'"))?;
    let header = header.trim();
    if header.is_empty() {
        return Err("Column name cannot be empty".to_string());
    }
    let kind = kind.parse::<FieldType>().map_err(|err| err.to_string())?;
    Ok((header.to_string(), kind))
}
