use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    CollectionId, CollectionSummary, DataStore, Record, RecordId, WriteOutcome,
};
use crate::{coerce::FieldValue, schema::CollectionConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredCollection {
    pub config: CollectionConfig,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub collections: BTreeMap<CollectionId, StoredCollection>,
}

/// Read-after-write consistent store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(self.read()?.clone())
    }

    /// Opens a JSON snapshot, starting empty when `path` does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = File::open(path).with_context(|| format!("Opening store file {path:?}"))?;
        let snapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing store file {path:?}"))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot()?;
        let file = File::create(path).with_context(|| format!("Creating store file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)
            .with_context(|| format!("Writing store file {path:?}"))
    }

    /// Finds a collection by exact name; the first match wins.
    pub fn collection_by_name(&self, name: &str) -> Result<Option<CollectionId>> {
        let state = self.read()?;
        Ok(state
            .collections
            .iter()
            .find(|(_, stored)| stored.config.name == name)
            .map(|(id, _)| id.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreSnapshot>> {
        self.state
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreSnapshot>> {
        self.state
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }
}

fn missing_collection(id: &CollectionId) -> anyhow::Error {
    anyhow!("Collection '{id}' not found")
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let state = self.read()?;
        Ok(state
            .collections
            .iter()
            .map(|(id, stored)| CollectionSummary {
                id: id.clone(),
                name: stored.config.name.clone(),
            })
            .collect())
    }

    async fn create_collection(&self) -> Result<Option<CollectionId>> {
        let id = CollectionId(Uuid::new_v4().to_string());
        self.write()?
            .collections
            .insert(id.clone(), StoredCollection::default());
        Ok(Some(id))
    }

    async fn configuration(&self, collection: &CollectionId) -> Result<CollectionConfig> {
        let state = self.read()?;
        state
            .collections
            .get(collection)
            .map(|stored| stored.config.clone())
            .ok_or_else(|| missing_collection(collection))
    }

    async fn save_configuration(
        &self,
        collection: &CollectionId,
        config: &CollectionConfig,
    ) -> Result<bool> {
        let mut state = self.write()?;
        match state.collections.get_mut(collection) {
            Some(stored) => {
                stored.config = config.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn records(&self, collection: &CollectionId) -> Result<Vec<Record>> {
        let state = self.read()?;
        state
            .collections
            .get(collection)
            .map(|stored| stored.records.clone())
            .ok_or_else(|| missing_collection(collection))
    }

    async fn find_record(
        &self,
        collection: &CollectionId,
        record: &RecordId,
    ) -> Result<Option<Record>> {
        let state = self.read()?;
        let stored = state
            .collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(stored.records.iter().find(|r| &r.id == record).cloned())
    }

    async fn create_record(
        &self,
        collection: &CollectionId,
        title: &str,
    ) -> Result<Option<RecordId>> {
        let mut state = self.write()?;
        let stored = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        let id = RecordId(Uuid::new_v4().to_string());
        stored.records.push(Record {
            id: id.clone(),
            title: title.to_string(),
            values: BTreeMap::new(),
        });
        Ok(Some(id))
    }

    async fn set_property(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        value: FieldValue,
    ) -> Result<WriteOutcome> {
        let mut state = self.write()?;
        let stored = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        if stored.config.field(field_id).is_none() {
            return Ok(WriteOutcome::MissingProperty);
        }
        let target = stored
            .records
            .iter_mut()
            .find(|r| &r.id == record)
            .ok_or_else(|| anyhow!("Record '{record}' not found in collection '{collection}'"))?;
        target.values.insert(field_id.to_string(), value);
        Ok(WriteOutcome::Applied)
    }

    async fn set_choice(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        label: &str,
    ) -> Result<WriteOutcome> {
        let choice_id = {
            let state = self.read()?;
            let stored = state
                .collections
                .get(collection)
                .ok_or_else(|| missing_collection(collection))?;
            let Some(field) = stored.config.field(field_id) else {
                return Ok(WriteOutcome::MissingProperty);
            };
            match field.choice_id(label) {
                Some(id) => id.to_string(),
                None => return Ok(WriteOutcome::UnknownChoice),
            }
        };
        self.set_property(collection, record, field_id, FieldValue::Choice(choice_id))
            .await
    }
}
