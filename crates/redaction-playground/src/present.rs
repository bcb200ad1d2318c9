//! Views over a [`RedactionResult`].
//!
//! Presentation only. Truncation in the table view is cosmetic and never
//! touches the data shown by the JSON view.

use std::fmt::Write as _;

use clap::ValueEnum;

use crate::error::Result;
use crate::pipeline::RedactionResult;

const ELLIPSIS: char = '…';

/// Output format for a run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// The redacted text
    #[default]
    Plain,
    /// One row per detection
    Table,
    /// The full result as JSON
    Json,
}

/// Render `result` in `format`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn present(
    result: &RedactionResult,
    format: OutputFormat,
    excerpt_chars: usize,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Plain => present_plain(result),
        OutputFormat::Table => present_table(result, excerpt_chars),
        OutputFormat::Json => present_json(result)?,
    })
}

/// The redacted text.
#[must_use]
pub fn present_plain(result: &RedactionResult) -> String {
    result.redacted_text.clone()
}

/// An aligned `TYPE | ORIGINAL | POSITION | SOURCE` table.
///
/// Original values longer than `excerpt_chars` are cut and end with `…`.
#[must_use]
pub fn present_table(result: &RedactionResult, excerpt_chars: usize) -> String {
    if result.detections.is_empty() {
        return "No detections.".to_string();
    }

    let header = ["TYPE", "ORIGINAL", "POSITION", "SOURCE"];
    let rows: Vec<[String; 4]> = result
        .detections
        .iter()
        .map(|d| {
            [
                d.kind.clone(),
                excerpt(&d.original_value, excerpt_chars),
                d.span.to_string(),
                d.origin.to_string(),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &header.map(str::to_string), &widths);
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    out.truncate(out.trim_end().len());
    out
}

fn write_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let _ = write!(line, "{cell:<width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Single-line excerpt of at most `max` characters.
fn excerpt(value: &str, max: usize) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    cut.push(ELLIPSIS);
    cut
}

/// The full result as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn present_json(result: &RedactionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
