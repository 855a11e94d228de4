//! Minimal text rendering
//!
//! The thin seam to the (out-of-scope) presentation layer: fixed-width
//! tables for record lists, key/value lines for single records. Absent
//! values render as `-`, never disappear.

use crate::Record;

/// Render records as a fixed-width table with a header row.
///
/// All records in one call share a subsystem and therefore a field set; the
/// header comes from the first record.
pub fn record_table(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return "(no records)\n".to_string();
    };

    let headers: Vec<&str> = first.fields().iter().map(|(name, _)| *name).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            record
                .fields()
                .into_iter()
                .map(|(_, value)| value.unwrap_or_else(|| "-".to_string()))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    for (i, header) in headers.iter().enumerate() {
        out.push_str(&format!("{:<width$}  ", header, width = widths[i]));
    }
    out.push('\n');
    for (i, _) in headers.iter().enumerate() {
        out.push_str(&format!("{:-<width$}  ", "", width = widths[i]));
    }
    out.push('\n');
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
        }
        out.push('\n');
    }

    out
}

/// Render one record as `name: value` lines.
pub fn record_detail(record: &Record) -> String {
    let fields = record.fields();
    let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (name, value) in fields {
        out.push_str(&format!(
            "{:<width$}  {}\n",
            name,
            value.unwrap_or_else(|| "-".to_string()),
            width = width
        ));
    }
    out
}
