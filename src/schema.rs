//! Collection schema model shared by provisioning, mapping, and the store.
//!
//! A collection is described by a [`CollectionConfig`]: its display settings
//! plus the ordered [`FieldSpec`] list. Field ids are unique within a
//! collection and never change once an import has started.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    DateTime,
    Checkbox,
    Choice,
    Url,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::DateTime => "datetime",
            FieldType::Checkbox => "checkbox",
            FieldType::Choice => "choice",
            FieldType::Url => "url",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["text", "number", "datetime", "checkbox", "choice", "url"]
    }

    /// Icon token the record store shows next to fields of this type.
    pub fn icon(&self) -> &'static str {
        match self {
            FieldType::Text => "ti-text",
            FieldType::Number => "ti-123",
            FieldType::DateTime => "ti-calendar",
            FieldType::Checkbox => "ti-checkbox",
            FieldType::Choice => "ti-tag",
            FieldType::Url => "ti-link",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "datetime" | "date" => Ok(FieldType::DateTime),
            "checkbox" | "boolean" => Ok(FieldType::Checkbox),
            "choice" => Ok(FieldType::Choice),
            "url" => Ok(FieldType::Url),
            other => Err(anyhow!(
                "Unknown field type '{other}'. Supported types: {}",
                FieldType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    pub color: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub icon: String,
    #[serde(default)]
    pub many: bool,
    #[serde(default)]
    pub read_only: bool,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceOption>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            icon: field_type.icon().to_string(),
            many: false,
            read_only: false,
            active: true,
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<ChoiceOption>) -> Self {
        self.choices = choices;
        self
    }

    /// Resolves a choice label to its option id.
    pub fn choice_id(&self, label: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|choice| choice.label == label)
            .map(|choice| choice.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ViewConfig {
    pub id: String,
    pub label: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub icon: String,
    pub shown: bool,
    pub read_only: bool,
    pub sort_field_id: Option<String>,
    pub sort_dir: String,
    pub group_by_field_id: Option<String>,
    pub field_ids: Vec<String>,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub page_field_ids: Vec<String>,
    #[serde(default)]
    pub sidebar_record_sort_field_id: Option<String>,
    #[serde(default)]
    pub sidebar_record_sort_dir: String,
    #[serde(default)]
    pub show_sidebar_items: bool,
    #[serde(default)]
    pub show_cmdpal_items: bool,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

impl CollectionConfig {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }
}
