//! Interface to the record store that owns collections and records.
//!
//! The import engine never persists anything itself. It lists, creates, and
//! mutates collections and records exclusively through [`DataStore`], which a
//! host implements for its own storage. [`MemoryStore`] is the reference
//! implementation used by the command-line host and the tests.
//!
//! Stores may be eventually consistent: a collection or record that was just
//! created is allowed to show up in later reads only after a delay. Callers
//! poll with [`crate::retry::RetryPolicy`] rather than assuming
//! read-after-write.

mod memory;

pub use memory::{MemoryStore, StoreSnapshot};

use std::{collections::BTreeMap, fmt};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{coerce::FieldValue, schema::CollectionConfig};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
}

/// A collection together with the configuration it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub config: CollectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn value(&self, field_id: &str) -> Option<&FieldValue> {
        self.values.get(field_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The record has no property with the requested field id.
    MissingProperty,
    /// The label matched none of the field's choice options.
    UnknownChoice,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Creates an empty collection; `None` when the store declined.
    async fn create_collection(&self) -> Result<Option<CollectionId>>;

    async fn configuration(&self, collection: &CollectionId) -> Result<CollectionConfig>;

    /// Returns `false` when the store explicitly refused to persist `config`.
    async fn save_configuration(
        &self,
        collection: &CollectionId,
        config: &CollectionConfig,
    ) -> Result<bool>;

    async fn records(&self, collection: &CollectionId) -> Result<Vec<Record>>;

    async fn find_record(
        &self,
        collection: &CollectionId,
        record: &RecordId,
    ) -> Result<Option<Record>> {
        let records = self.records(collection).await?;
        Ok(records.into_iter().find(|r| &r.id == record))
    }

    /// Creates a record titled `title`; `None` when no id was assigned.
    async fn create_record(&self, collection: &CollectionId, title: &str)
    -> Result<Option<RecordId>>;

    async fn set_property(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        value: FieldValue,
    ) -> Result<WriteOutcome>;

    async fn set_choice(
        &self,
        collection: &CollectionId,
        record: &RecordId,
        field_id: &str,
        label: &str,
    ) -> Result<WriteOutcome>;

    async fn collection(&self, id: &CollectionId) -> Result<Collection> {
        let config = self.configuration(id).await?;
        Ok(Collection {
            id: id.clone(),
            config,
        })
    }
}
