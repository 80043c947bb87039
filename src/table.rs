use std::fmt::Write as _;

use itertools::Itertools;

/// Renders left-aligned columns separated by two spaces, with a dashed rule
/// under the header. Line breaks inside cells are flattened to spaces.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let flatten = |value: &str| value.replace(['\n', '\r', '\t'], " ");
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(flatten(cell).chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", flatten(cell), width = *width))
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(rule.as_slice()));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row.as_slice()));
    }
    output
}
