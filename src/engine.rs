//! Batched create-or-update of records from CSV rows.
//!
//! Rows are matched to existing records by case-insensitive title. A row
//! whose title is already known updates that record in place; any other row
//! creates a record and is indexed immediately, so a later row with the same
//! title updates it instead of duplicating it. Rows run strictly in input
//! order, one store call at a time.
//!
//! Only a malformed CSV or a failure to read the collection up front aborts
//! an import. Everything that goes wrong inside a row is logged and counted
//! as skipped; a field that cannot be written is logged and the remaining
//! fields of the row are still written.

use std::{collections::HashMap, fmt, time::Duration};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    coerce::{Coerced, coerce_value},
    error::{ImportError, RowFailure},
    mapping::{ColumnMapping, FieldMapping},
    parser::{ParsedTable, parse_csv},
    retry::RetryPolicy,
    store::{CollectionId, DataStore, Record, RecordId, WriteOutcome},
};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(10);
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportResult {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created: {}, Updated: {}, Skipped: {}",
            self.created, self.updated, self.skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub batch_size: usize,
    /// Pause between batches so a host event loop gets a turn.
    pub batch_pause: Duration,
    /// How long to look for a freshly created record before giving up on it.
    pub record_lookup: RetryPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
            record_lookup: RetryPolicy::new(
                5,
                Duration::from_millis(10),
                Duration::from_millis(200),
            ),
        }
    }
}

enum RowOutcome {
    Created,
    Updated,
}

pub struct Importer<'a, S: DataStore + ?Sized> {
    store: &'a S,
    options: ImportOptions,
}

impl<'a, S: DataStore + ?Sized> Importer<'a, S> {
    pub fn new(store: &'a S, options: ImportOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Parses `csv_text` and imports its rows; nothing touches the store when
    /// the text is malformed.
    pub async fn import_csv(
        &self,
        collection: &CollectionId,
        csv_text: &str,
    ) -> Result<ImportResult, ImportError> {
        let table = parse_csv(csv_text)?;
        self.import_table(collection, &table).await
    }

    pub async fn import_table(
        &self,
        collection: &CollectionId,
        table: &ParsedTable,
    ) -> Result<ImportResult, ImportError> {
        debug!("Headers: {:?}", table.headers);
        debug!("Rows: {}", table.row_count());

        let config = self.store.configuration(collection).await?;
        let mapping = FieldMapping::build(&table.headers, &config.fields);
        debug!("Mapping: {:?}", mapping.columns());
        if mapping.matched_count() == 0 {
            warn!("No CSV header matches a field of '{}'", config.name);
        }

        let existing = self.store.records(collection).await?;
        let mut by_title = index_by_title(existing);
        let title_column = mapping.title_column();

        let mut result = ImportResult::default();
        let batch_size = self.options.batch_size.max(1);
        let batch_count = table.rows.len().div_ceil(batch_size);
        for (batch_idx, batch) in table.rows.chunks(batch_size).enumerate() {
            for (offset, row) in batch.iter().enumerate() {
                let line = batch_idx * batch_size + offset + 2;
                match self
                    .import_row(collection, table, &mapping, title_column, row, &mut by_title)
                    .await
                {
                    Ok(RowOutcome::Created) => result.created += 1,
                    Ok(RowOutcome::Updated) => result.updated += 1,
                    Err(err) => {
                        warn!("Row {line} skipped: {err:#}");
                        result.skipped += 1;
                    }
                }
            }
            if batch_idx + 1 < batch_count && !self.options.batch_pause.is_zero() {
                tokio::time::sleep(self.options.batch_pause).await;
            }
        }

        info!("Import into '{}' complete. {result}", config.name);
        Ok(result)
    }

    async fn import_row(
        &self,
        collection: &CollectionId,
        table: &ParsedTable,
        mapping: &FieldMapping,
        title_column: Option<usize>,
        row: &[String],
        by_title: &mut HashMap<String, RecordId>,
    ) -> anyhow::Result<RowOutcome> {
        let values = table.row_values(row);
        let title = title_column
            .and_then(|idx| values.get(idx))
            .and_then(|(_, value)| *value)
            .unwrap_or(UNTITLED)
            .to_string();
        let key = title.to_lowercase();

        if let Some(record) = by_title.get(&key) {
            self.apply_values(collection, record, mapping, &values).await;
            return Ok(RowOutcome::Updated);
        }

        let record = self.create_record(collection, &title).await?;
        self.apply_values(collection, &record.id, mapping, &values)
            .await;
        by_title.insert(key, record.id);
        Ok(RowOutcome::Created)
    }

    async fn create_record(&self, collection: &CollectionId, title: &str) -> anyhow::Result<Record> {
        let failure = |reason: &str| RowFailure::RecordCreation {
            title: title.to_string(),
            reason: reason.to_string(),
        };
        let id = self
            .store
            .create_record(collection, title)
            .await?
            .ok_or_else(|| failure("store returned no record id"))?;
        let id_ref = &id;
        let record = self
            .options
            .record_lookup
            .poll("created record", || self.store.find_record(collection, id_ref))
            .await?
            .ok_or_else(|| failure(&format!("record {id} could not be located after creation")))?;
        Ok(record)
    }

    async fn apply_values(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        mapping: &FieldMapping,
        values: &[(&str, Option<&str>)],
    ) {
        for (idx, (header, value)) in values.iter().enumerate() {
            let (Some(ColumnMapping::Matched { field_id, field_type }), Some(raw)) =
                (mapping.get(idx), value)
            else {
                continue;
            };
            let outcome = match coerce_value(*field_type, raw) {
                Coerced::Absent => continue,
                Coerced::Set(typed) => {
                    self.store
                        .set_property(collection, record, field_id, typed)
                        .await
                }
                Coerced::Choice(label) => {
                    self.store
                        .set_choice(collection, record, field_id, &label)
                        .await
                }
            };
            match outcome {
                Ok(WriteOutcome::Applied) => {}
                Ok(WriteOutcome::UnknownChoice) => {
                    info!("Choice '{raw}' not found in field {field_id}");
                }
                Ok(WriteOutcome::MissingProperty) => {
                    let failure = RowFailure::FieldWrite {
                        field_id: field_id.clone(),
                        reason: format!("record {record} has no such property"),
                    };
                    warn!("Column '{header}': {failure}");
                }
                Err(err) => {
                    let failure = RowFailure::FieldWrite {
                        field_id: field_id.clone(),
                        reason: format!("{err:#}"),
                    };
                    warn!("Column '{header}': {failure}");
                }
            }
        }
    }
}

/// Lower-cased title to record id; the first record wins on duplicate titles
/// and untitled records are left out.
fn index_by_title(records: Vec<Record>) -> HashMap<String, RecordId> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if record.title.is_empty() {
            continue;
        }
        index.entry(record.title.to_lowercase()).or_insert(record.id);
    }
    index
}

/// Imports `csv_text` into `collection` with [`ImportOptions::default`].
pub async fn import_csv<S>(
    store: &S,
    collection: &CollectionId,
    csv_text: &str,
) -> Result<ImportResult, ImportError>
where
    S: DataStore + ?Sized,
{
    Importer::new(store, ImportOptions::default())
        .import_csv(collection, csv_text)
        .await
}
