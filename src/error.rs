//! Failure taxonomy for schema provisioning and CSV imports.
//!
//! Only [`ImportError`] ever reaches a caller. [`RowFailure`] describes the
//! problems that are recovered at the row or field boundary and show up as
//! `skipped` counts and log lines instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV must have at least a header row and one data row")]
    MalformedInput,
    #[error("Collection '{collection}' could not be persisted: {reason}")]
    SchemaPersistence { collection: String, reason: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ImportError {
    pub(crate) fn persistence(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        ImportError::SchemaPersistence {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RowFailure {
    #[error("Record '{title}' could not be created: {reason}")]
    RecordCreation { title: String, reason: String },
    #[error("Field '{field_id}' could not be written: {reason}")]
    FieldWrite { field_id: String, reason: String },
}
