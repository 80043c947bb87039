//! Creates a collection whose fields mirror a CSV's headers.
//!
//! The configuration is written once, before any record is imported. Because
//! the store may apply it lazily, [`create_schema`] polls until the new
//! collection is listed with every field in place and refuses to hand back a
//! collection it could not verify.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};

use crate::{
    error::ImportError,
    inference::TypeAssignment,
    mapping::normalize_field_name,
    retry::RetryPolicy,
    schema::{ChoiceOption, CollectionConfig, FieldSpec, FieldType, ViewConfig},
    store::{Collection, CollectionId, DataStore},
};

pub const COLLECTION_ICON: &str = "ti-database";
pub const COLLECTION_ITEM_NAME: &str = "Item";
pub const COLLECTION_DESCRIPTION: &str = "Imported from CSV";

/// One field per header. Ids are normalized header names, falling back to
/// `field_<index>` when normalization leaves nothing or repeats an id.
pub fn build_fields(
    headers: &[String],
    assignment: &TypeAssignment,
    choices: &BTreeMap<String, Vec<ChoiceOption>>,
) -> Vec<FieldSpec> {
    let mut used = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let normalized = normalize_field_name(header);
            let id = if normalized.is_empty() || used.contains(&normalized) {
                format!("field_{idx}")
            } else {
                normalized
            };
            used.insert(id.clone());
            let field_type = assignment.type_of(header);
            let field = FieldSpec::new(id, header.clone(), field_type);
            if field_type == FieldType::Choice {
                let options = choices.get(header).cloned().unwrap_or_default();
                debug!("Added {} choice(s) for field '{header}'", options.len());
                field.with_choices(options)
            } else {
                field
            }
        })
        .collect()
}

/// Collection settings for an imported table: every field on the page, the
/// sidebar sorted by the first field, and a single table view.
pub fn build_config(name: &str, fields: Vec<FieldSpec>) -> CollectionConfig {
    let field_ids: Vec<String> = fields.iter().map(|f| f.id.clone()).collect();
    let first_id = field_ids.first().cloned();
    CollectionConfig {
        name: name.to_string(),
        icon: COLLECTION_ICON.to_string(),
        item_name: COLLECTION_ITEM_NAME.to_string(),
        description: COLLECTION_DESCRIPTION.to_string(),
        fields,
        page_field_ids: field_ids.clone(),
        sidebar_record_sort_field_id: Some(first_id.clone().unwrap_or_else(|| "title".to_string())),
        sidebar_record_sort_dir: "desc".to_string(),
        show_sidebar_items: true,
        show_cmdpal_items: true,
        views: vec![ViewConfig {
            id: "table".to_string(),
            label: "Table".to_string(),
            description: "Table view".to_string(),
            kind: "table".to_string(),
            icon: "ti-table".to_string(),
            shown: true,
            read_only: false,
            sort_field_id: first_id,
            sort_dir: "asc".to_string(),
            group_by_field_id: None,
            field_ids,
            query: String::new(),
        }],
    }
}

/// Creates and verifies a collection named `name` with one field per header.
pub async fn create_schema<S>(
    store: &S,
    name: &str,
    headers: &[String],
    assignment: &TypeAssignment,
    choices: &BTreeMap<String, Vec<ChoiceOption>>,
    policy: &RetryPolicy,
) -> Result<Collection, ImportError>
where
    S: DataStore + ?Sized,
{
    info!("Creating collection '{name}' with {} field(s)", headers.len());
    let id = store
        .create_collection()
        .await?
        .ok_or_else(|| ImportError::persistence(name, "store did not create a collection"))?;
    debug!("Collection '{name}' created with id {id}");

    let config = build_config(name, build_fields(headers, assignment, choices));

    if !store.save_configuration(&id, &config).await? {
        return Err(ImportError::persistence(
            name,
            "store refused to save the configuration",
        ));
    }

    let expected = config.fields.len();
    let id_ref = &id;
    let verified = policy
        .poll("collection configuration", || verify(store, id_ref, expected))
        .await?;
    match verified {
        Some(config) => {
            info!(
                "Collection '{name}' verified with {} field(s)",
                config.fields.len()
            );
            Ok(Collection { id, config })
        }
        None => {
            warn!("Collection '{name}' ({id}) never showed its {expected} field(s)");
            Err(ImportError::persistence(
                name,
                format!("configuration did not persist {expected} field(s)"),
            ))
        }
    }
}

async fn verify<S>(
    store: &S,
    id: &CollectionId,
    expected: usize,
) -> anyhow::Result<Option<CollectionConfig>>
where
    S: DataStore + ?Sized,
{
    let listed = store
        .list_collections()
        .await?
        .iter()
        .any(|summary| &summary.id == id);
    if !listed {
        return Ok(None);
    }
    let config = store.configuration(id).await?;
    if config.fields.is_empty() || config.fields.len() != expected {
        return Ok(None);
    }
    Ok(Some(config))
}
