//! Field type proposals for CSV columns.
//!
//! A CSV may carry an optional hint row directly below the header that names
//! a type per column (`text`, `number`, `choice`, ...). When present, the
//! hints decide the proposal; otherwise each column's type is inferred from a
//! small sample of its values. Either way the result is only a proposal: the
//! caller reviews and edits the [`TypeAssignment`] before a collection is
//! created from it.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    coerce::{coerce_number, parse_datetime},
    mapping::normalize_field_name,
    schema::{ChoiceOption, FieldType},
};

pub const TYPE_HINT_TOKENS: &[&str] = &[
    "text", "number", "datetime", "date", "checkbox", "choice", "url", "email", "phone",
];

pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const CHOICE_COLOR_COUNT: usize = 12;

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "yes", "no", "1", "0"];

fn is_hint_token(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    TYPE_HINT_TOKENS.contains(&lowered.as_str())
}

/// True when at least half of the cells name a type.
pub fn is_type_hint_row(row: &[String]) -> bool {
    if row.is_empty() {
        return false;
    }
    let hits = row.iter().filter(|cell| is_hint_token(cell)).count();
    hits * 2 >= row.len()
}

/// Field type selected by a hint token; unrecognised hints fall back to text.
pub fn hint_to_type(token: &str) -> FieldType {
    match token.trim().to_lowercase().as_str() {
        "number" => FieldType::Number,
        "datetime" | "date" => FieldType::DateTime,
        "checkbox" => FieldType::Checkbox,
        "choice" => FieldType::Choice,
        "url" => FieldType::Url,
        _ => FieldType::Text,
    }
}

/// Ordered header to field type assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeAssignment {
    pub columns: Vec<ColumnAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnAssignment {
    pub header: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl TypeAssignment {
    pub fn uniform(headers: &[String], field_type: FieldType) -> Self {
        Self {
            columns: headers
                .iter()
                .map(|header| ColumnAssignment {
                    header: header.clone(),
                    field_type,
                })
                .collect(),
        }
    }

    /// Type for `header`, text when the header was never assigned.
    pub fn type_of(&self, header: &str) -> FieldType {
        self.columns
            .iter()
            .find(|c| c.header == header)
            .map(|c| c.field_type)
            .unwrap_or_default()
    }

    /// Overrides the type of `header`, appending it when unknown.
    pub fn set(&mut self, header: &str, field_type: FieldType) {
        match self.columns.iter_mut().find(|c| c.header == header) {
            Some(column) => column.field_type = field_type,
            None => self.columns.push(ColumnAssignment {
                header: header.to_string(),
                field_type,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating types file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing types YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening types file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file)).context("Parsing types YAML")
    }
}

/// Up to `limit` non-empty values from `column`, in row order.
pub fn sample_values<'a>(rows: &'a [Vec<String>], column: usize, limit: usize) -> Vec<&'a str> {
    rows.iter()
        .filter_map(|row| row.get(column))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .take(limit)
        .collect()
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    seen: usize,
    possible_checkbox: bool,
    possible_number: bool,
    possible_datetime: bool,
    possible_url: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            seen: 0,
            possible_checkbox: true,
            possible_number: true,
            possible_datetime: true,
            possible_url: true,
        }
    }

    fn observe(&mut self, value: &str) {
        self.seen += 1;
        let lowered = value.to_ascii_lowercase();
        if self.possible_checkbox && !BOOLEAN_TOKENS.contains(&lowered.as_str()) {
            self.possible_checkbox = false;
        }
        if self.possible_number && coerce_number(value).is_none() {
            self.possible_number = false;
        }
        if self.possible_datetime && parse_datetime(value).is_none() {
            self.possible_datetime = false;
        }
        if self.possible_url && !(lowered.starts_with("http://") || lowered.starts_with("https://"))
        {
            self.possible_url = false;
        }
    }

    fn decide(&self) -> FieldType {
        if self.seen == 0 {
            FieldType::Text
        } else if self.possible_checkbox {
            FieldType::Checkbox
        } else if self.possible_number {
            FieldType::Number
        } else if self.possible_datetime {
            FieldType::DateTime
        } else if self.possible_url {
            FieldType::Url
        } else {
            FieldType::Text
        }
    }
}

/// Proposes a type per header from the hint row when given, otherwise from
/// the first [`DEFAULT_SAMPLE_ROWS`] sample values of each column.
pub fn propose_types(
    headers: &[String],
    hints: Option<&[String]>,
    sample_rows: &[Vec<String>],
) -> TypeAssignment {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let field_type = match hints.and_then(|h| h.get(idx)) {
                Some(hint) => hint_to_type(hint),
                None => {
                    let mut candidate = TypeCandidate::new();
                    for value in sample_values(sample_rows, idx, DEFAULT_SAMPLE_ROWS) {
                        candidate.observe(value);
                    }
                    candidate.decide()
                }
            };
            ColumnAssignment {
                header: header.clone(),
                field_type,
            }
        })
        .collect();
    TypeAssignment { columns }
}

/// Choice options for every column assigned [`FieldType::Choice`], built
/// from the column's distinct trimmed values in first-seen order.
pub fn build_choice_options(
    headers: &[String],
    rows: &[Vec<String>],
    assignment: &TypeAssignment,
) -> BTreeMap<String, Vec<ChoiceOption>> {
    let mut options = BTreeMap::new();
    for (col_idx, header) in headers.iter().enumerate() {
        if assignment.type_of(header) != FieldType::Choice {
            continue;
        }
        let choices = rows
            .iter()
            .filter_map(|row| row.get(col_idx))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .unique()
            .enumerate()
            .map(|(idx, value)| {
                let normalized = normalize_field_name(value);
                ChoiceOption {
                    id: if normalized.is_empty() {
                        format!("choice_{idx}")
                    } else {
                        normalized
                    },
                    label: value.to_string(),
                    color: ((idx % CHOICE_COLOR_COUNT) + 1).to_string(),
                    active: true,
                }
            })
            .collect::<Vec<_>>();
        debug!(
            "Found {} unique value(s) for choice field '{header}'",
            choices.len()
        );
        options.insert(header.clone(), choices);
    }
    options
}
