//! Raw cell to typed value conversion.
//!
//! Every function here is total: malformed input turns into "no value"
//! (or `false` for checkboxes) instead of an error, so one bad cell never
//! costs the rest of its row.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::FieldType;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// A typed value as stored on a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Choice(String),
}

/// Outcome of coercing one cell for a field type.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Set(FieldValue),
    /// A choice label the store resolves against the field's options.
    Choice(String),
    Absent,
}

fn number_pattern() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid number pattern"))
}

/// Plain decimal numbers only: no exponent, no thousands separators.
pub fn coerce_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if !number_pattern().is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `true`, `yes`, and `1` are true; anything else, recognised or not, is false.
pub fn coerce_boolean(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1"
    )
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn coerce_value(field_type: FieldType, raw: &str) -> Coerced {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Coerced::Absent;
    }
    let value = match field_type {
        FieldType::Number => coerce_number(trimmed).map(FieldValue::Number),
        FieldType::Checkbox => Some(FieldValue::Boolean(coerce_boolean(trimmed))),
        FieldType::DateTime => parse_datetime(trimmed).map(FieldValue::DateTime),
        FieldType::Choice => return Coerced::Choice(trimmed.to_string()),
        FieldType::Text | FieldType::Url => Some(FieldValue::Text(trimmed.to_string())),
    };
    value.map(Coerced::Set).unwrap_or(Coerced::Absent)
}
