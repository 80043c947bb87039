//! Maps CSV headers onto collection fields by normalized name.

use std::sync::OnceLock;

use regex::Regex;

use crate::schema::{FieldSpec, FieldType};

fn separator_runs() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s\-_]+").expect("valid separator pattern"))
}

/// Lower-cases `name` and strips whitespace, hyphens, and underscores.
pub fn normalize_field_name(name: &str) -> String {
    separator_runs()
        .replace_all(&name.to_lowercase(), "")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapping {
    Matched { field_id: String, field_type: FieldType },
    Unmatched,
}

impl ColumnMapping {
    pub fn is_matched(&self) -> bool {
        matches!(self, ColumnMapping::Matched { .. })
    }
}

/// One [`ColumnMapping`] per CSV header, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    columns: Vec<(String, ColumnMapping)>,
}

impl FieldMapping {
    pub fn build(headers: &[String], fields: &[FieldSpec]) -> Self {
        let columns = headers
            .iter()
            .map(|header| {
                let normalized = normalize_field_name(header);
                let matched = fields.iter().find(|field| {
                    normalize_field_name(&field.id) == normalized
                        || normalize_field_name(&field.label) == normalized
                });
                let mapping = match matched {
                    Some(field) => ColumnMapping::Matched {
                        field_id: field.id.clone(),
                        field_type: field.field_type,
                    },
                    None => ColumnMapping::Unmatched,
                };
                (header.clone(), mapping)
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[(String, ColumnMapping)] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&ColumnMapping> {
        self.columns.get(index).map(|(_, mapping)| mapping)
    }

    pub fn matched_count(&self) -> usize {
        self.columns.iter().filter(|(_, m)| m.is_matched()).count()
    }

    /// Column index supplying record titles: a matched `title` column, then a
    /// matched `name` column, then the first matched column.
    pub fn title_column(&self) -> Option<usize> {
        let matched_named = |wanted: &str| {
            self.columns.iter().position(|(header, mapping)| {
                mapping.is_matched() && normalize_field_name(header) == wanted
            })
        };
        matched_named("title")
            .or_else(|| matched_named("name"))
            .or_else(|| self.columns.iter().position(|(_, m)| m.is_matched()))
    }
}
