#![allow(dead_code)]

use std::{
    collections::HashSet,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use csv_upsert::{
    coerce::FieldValue,
    provision::build_config,
    schema::{CollectionConfig, FieldSpec, FieldType},
    store::{
        CollectionId, CollectionSummary, DataStore, MemoryStore, Record, RecordId, WriteOutcome,
    },
};
use tempfile::{TempDir, tempdir};

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Memory store holding one collection named `name` with the given fields.
pub async fn store_with_fields(name: &str, fields: &[(&str, &str, FieldType)]) -> (MemoryStore, CollectionId) {
    let store = MemoryStore::new();
    let id = store.create_collection().await.unwrap().unwrap();
    let specs = fields
        .iter()
        .map(|(id, label, ty)| FieldSpec::new(*id, *label, *ty))
        .collect();
    let config: CollectionConfig = build_config(name, specs);
    assert!(store.save_configuration(&id, &config).await.unwrap());
    (store, id)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Wraps a [`MemoryStore`] to inject failures and count calls.
///
/// * titles in `failing_titles` make `create_record` return an error
/// * titles in `idless_titles` make `create_record` return no id
/// * `hidden_reads` configuration reads report no fields before the real
///   configuration shows up
/// * `drop_configuration` discards every saved configuration
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub failing_titles: HashSet<String>,
    pub idless_titles: HashSet<String>,
    pub failing_fields: HashSet<String>,
    pub hidden_reads: AtomicUsize,
    pub drop_configuration: bool,
    pub calls: AtomicUsize,
    pub created_titles: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataStore for FaultyStore {
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        self.touch();
        self.inner.list_collections().await
    }

    async fn create_collection(&self) -> Result<Option<CollectionId>> {
        self.touch();
        self.inner.create_collection().await
    }

    async fn configuration(&self, collection: &CollectionId) -> Result<CollectionConfig> {
        self.touch();
        let hidden = self
            .hidden_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut config = self.inner.configuration(collection).await?;
        if hidden {
            config.fields.clear();
        }
        Ok(config)
    }

    async fn save_configuration(
        &self,
        collection: &CollectionId,
        config: &CollectionConfig,
    ) -> Result<bool> {
        self.touch();
        if self.drop_configuration {
            return Ok(true);
        }
        self.inner.save_configuration(collection, config).await
    }

    async fn records(&self, collection: &CollectionId) -> Result<Vec<Record>> {
        self.touch();
        self.inner.records(collection).await
    }

    async fn create_record(
        &self,
        collection: &CollectionId,
        title: &str,
    ) -> Result<Option<RecordId>> {
        self.touch();
        if self.failing_titles.contains(title) {
            bail!("simulated failure creating '{title}'");
        }
        if self.idless_titles.contains(title) {
            return Ok(None);
        }
        self.created_titles.lock().unwrap().push(title.to_string());
        self.inner.create_record(collection, title).await
    }

    async fn set_property(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        value: FieldValue,
    ) -> Result<WriteOutcome> {
        self.touch();
        if self.failing_fields.contains(field_id) {
            bail!("simulated failure writing '{field_id}'");
        }
        self.inner
            .set_property(collection, record, field_id, value)
            .await
    }

    async fn set_choice(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        label: &str,
    ) -> Result<WriteOutcome> {
        self.touch();
        self.inner
            .set_choice(collection, record, field_id, label)
            .await
    }
}

/// Record titled `title` (case-insensitive) in `collection`.
pub async fn record_titled<S: DataStore>(
    store: &S,
    collection: &CollectionId,
    title: &str,
) -> Option<Record> {
    store
        .records(collection)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.title.eq_ignore_ascii_case(title))
}
