//! CSV tokenizer and writer.
//!
//! The tokenizer is a single left-to-right scan with one character of
//! lookahead. Commas and line breaks only separate fields and rows outside
//! double quotes, a doubled quote inside a quoted section is a literal quote,
//! and unquoted fields are trimmed. Blank lines never produce rows.

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator};

use crate::error::ImportError;

/// Header row plus data rows, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `row`/`column`; cells past the end of a short row read as "".
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Pairs each header with the row's value, treating empty and missing
    /// trailing cells as absent.
    pub fn row_values<'a>(&'a self, row: &'a [String]) -> Vec<(&'a str, Option<&'a str>)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = row.get(idx).map(String::as_str).filter(|v| !v.is_empty());
                (header.as_str(), value)
            })
            .collect()
    }

    /// Removes and returns the first data row when `is_hint` accepts it.
    pub fn split_hint_row<F>(&mut self, is_hint: F) -> Option<Vec<String>>
    where
        F: Fn(&[String]) -> bool,
    {
        match self.rows.first() {
            Some(first) if is_hint(first) => Some(self.rows.remove(0)),
            _ => None,
        }
    }
}

/// Splits `text` into logical rows without interpreting a header.
pub fn tokenize(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                row.push(field.trim().to_string());
                field.clear();
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if !field.is_empty() || !row.is_empty() {
                    row.push(field.trim().to_string());
                    rows.push(std::mem::take(&mut row));
                    field.clear();
                }
            }
            other => field.push(other),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field.trim().to_string());
        rows.push(row);
    }
    rows
}

/// Parses CSV text into a header row and at least one data row.
pub fn parse_csv(text: &str) -> Result<ParsedTable, ImportError> {
    let mut rows = tokenize(text).into_iter();
    let headers = rows.next().ok_or(ImportError::MalformedInput)?;
    let rows: Vec<Vec<String>> = rows.collect();
    if rows.is_empty() {
        return Err(ImportError::MalformedInput);
    }
    Ok(ParsedTable { headers, rows })
}

/// Serializes a table back to CSV text, quoting only the cells that need it.
pub fn write_csv(headers: &[String], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(headers).context("Writing CSV header")?;
    for (idx, row) in rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Writing CSV row {}", idx + 2))?;
    }
    let bytes = writer.into_inner().context("Flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV writer produced invalid UTF-8")
}
