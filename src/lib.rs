//! CSV import into schema-bearing record collections.
//!
//! The pipeline runs leaves first: [`parser`] turns text into a header and
//! rows, [`inference`] proposes a field type per column, [`provision`]
//! creates a verified collection from the reviewed types, [`mapping`] pairs
//! headers with fields, [`coerce`] converts cells, and [`engine`] upserts
//! one record per row keyed by case-insensitive title. All storage goes
//! through the [`store::DataStore`] trait.

pub mod cli;
pub mod coerce;
pub mod engine;
pub mod error;
pub mod inference;
pub mod io_utils;
pub mod mapping;
pub mod parser;
pub mod provision;
pub mod retry;
pub mod schema;
pub mod store;
pub mod table;

pub use engine::{ImportOptions, ImportResult, Importer, import_csv};
pub use error::ImportError;
pub use inference::{build_choice_options, is_type_hint_row};
pub use parser::{ParsedTable, parse_csv, write_csv};
pub use provision::create_schema;

use std::{env, path::Path, sync::OnceLock, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    inference::{DEFAULT_SAMPLE_ROWS, TypeAssignment, propose_types, sample_values},
    retry::RetryPolicy,
    store::{CollectionId, DataStore, MemoryStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

const PROBE_EXAMPLES: usize = 3;

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_upsert", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Starting async runtime")?;
    runtime.block_on(async {
        match cli.command {
            Commands::Probe(args) => handle_probe(&args),
            Commands::Create(args) => handle_create(&args).await,
            Commands::Import(args) => handle_import(&args).await,
            Commands::Collections(args) => handle_collections(&args).await,
        }
    })
}

fn read_table(input: &Path, encoding: Option<&str>) -> Result<(ParsedTable, Option<Vec<String>>)> {
    let encoding = io_utils::resolve_encoding(encoding)?;
    let text = io_utils::read_input(input, encoding)?;
    let mut table = parse_csv(&text).with_context(|| format!("Parsing {input:?}"))?;
    let hints = table.split_hint_row(is_type_hint_row);
    if let Some(hints) = &hints {
        info!("Found type hints in row 2: {hints:?}");
    }
    Ok((table, hints))
}

fn import_options(tuning: &cli::ImportTuning) -> ImportOptions {
    ImportOptions {
        batch_size: tuning.batch_size,
        batch_pause: Duration::from_millis(tuning.batch_pause_ms),
        ..ImportOptions::default()
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let (table, hints) = read_table(&args.input, args.input_encoding.as_deref())?;
    let sample = &table.rows[..table.rows.len().min(DEFAULT_SAMPLE_ROWS)];
    let proposal = propose_types(&table.headers, hints.as_deref(), sample);

    let rows = table
        .headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            vec![
                header.clone(),
                proposal.type_of(header).to_string(),
                sample_values(sample, idx, PROBE_EXAMPLES).join(", "),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["column", "type", "examples"].map(String::from);
    print!("{}", table::render_table(&headers, &rows));

    if let Some(output) = &args.output {
        proposal
            .save(output)
            .with_context(|| format!("Writing type assignment to {output:?}"))?;
        info!(
            "Type assignment for {} column(s) written to {:?}",
            proposal.columns.len(),
            output
        );
    }
    Ok(())
}

async fn handle_create(args: &cli::CreateArgs) -> Result<()> {
    let (table, hints) = read_table(&args.input, args.input_encoding.as_deref())?;
    let mut assignment = match &args.types {
        Some(path) => TypeAssignment::load(path)
            .with_context(|| format!("Loading type assignment from {path:?}"))?,
        None => {
            let sample = &table.rows[..table.rows.len().min(DEFAULT_SAMPLE_ROWS)];
            propose_types(&table.headers, hints.as_deref(), sample)
        }
    };
    for (header, field_type) in &args.type_overrides {
        if !table.headers.contains(header) {
            return Err(anyhow!("Column '{header}' not found in {:?}", args.input));
        }
        assignment.set(header, *field_type);
    }
    debug!("Type assignment: {assignment:?}");

    let choices = build_choice_options(&table.headers, &table.rows, &assignment);
    let store = MemoryStore::load(&args.store)?;
    let collection = create_schema(
        &store,
        &args.name,
        &table.headers,
        &assignment,
        &choices,
        &RetryPolicy::default(),
    )
    .await?;
    store.save(&args.store)?;

    let result = Importer::new(&store, import_options(&args.tuning))
        .import_table(&collection.id, &table)
        .await?;
    store.save(&args.store)?;
    println!("Collection {} ({})", args.name, collection.id);
    println!("{result}");
    Ok(())
}

async fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let text = io_utils::read_input(&args.input, encoding)?;
    let store = MemoryStore::load(&args.store)?;
    let collection = resolve_collection(&store, args).await?;
    info!("Importing {:?} into collection {collection}", args.input);

    let result = Importer::new(&store, import_options(&args.tuning))
        .import_csv(&collection, &text)
        .await
        .with_context(|| format!("Importing {:?}", args.input))?;
    store.save(&args.store)?;
    println!("{result}");
    Ok(())
}

async fn resolve_collection(store: &MemoryStore, args: &cli::ImportArgs) -> Result<CollectionId> {
    if let Some(name) = &args.name {
        return store
            .collection_by_name(name)?
            .ok_or_else(|| anyhow!("Collection named '{name}' not found in {:?}", args.store));
    }
    let id = CollectionId(args.collection.clone().unwrap_or_default());
    let known = store
        .list_collections()
        .await?
        .iter()
        .any(|summary| summary.id == id);
    if known {
        Ok(id)
    } else {
        Err(anyhow!("Collection '{id}' not found in {:?}", args.store))
    }
}

async fn handle_collections(args: &cli::CollectionsArgs) -> Result<()> {
    let store = MemoryStore::load(&args.store)?;
    let mut rows = Vec::new();
    for summary in store.list_collections().await? {
        let config = store.configuration(&summary.id).await?;
        let records = store.records(&summary.id).await?;
        rows.push(vec![
            summary.id.to_string(),
            summary.name,
            config.fields.len().to_string(),
            records.len().to_string(),
        ]);
    }
    if rows.is_empty() {
        println!("No collections in {:?}", args.store);
        return Ok(());
    }
    let headers = ["id", "name", "fields", "records"].map(String::from);
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}
