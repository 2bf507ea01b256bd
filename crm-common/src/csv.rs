//! Shared CSV codec for the import wizard and the exports
//!
//! Quoted fields, doubled quotes, embedded commas and line breaks all go
//! through the `csv` crate in both directions.

use std::collections::BTreeMap;

use ::csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::{Error, Result};

/// Parsed CSV: trimmed header row plus data rows padded to the header width
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a header (exact match after trimming)
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header.trim())
    }

    /// Rows as header → value maps
    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Parse CSV text whose first row is the header
///
/// A leading byte-order mark is ignored, blank lines are skipped and ragged
/// rows are padded (or truncated) to the header width. A line such as `,`
/// is a row of empty cells, not a blank line.
pub fn parse(text: &str) -> Result<CsvTable> {
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::Validation("CSV file has no header row".to_string()));
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Whitespace-only line; a row of empty cells keeps its delimiters
        if record.len() < width && record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(CsvTable { headers, rows })
}

/// Serialize a header row and data rows
///
/// Fields containing a comma, quote or line break are quoted with inner
/// quotes doubled; lines end with `\n`.
pub fn write<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(headers.iter().map(|h| h.as_ref()))?;
    for row in rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Validation(format!("CSV output is not UTF-8: {}", e)))
}
