//! CSV ingestion: splitting a document into rows and rows into fields.
//!
//! The row parser never fails; unbalanced or stray quotes produce
//! best-effort fields instead of an error.

use std::path::Path;

use crate::domain::row::Row;
use crate::error::{Result, VolleyError};

/// Split one raw line into trimmed fields.
///
/// A `"` outside a quote opens one; a `"` inside a quote closes the field.
/// A `,` outside a quote ends the current field. A `,` right after a
/// quote-closed field only terminates it, so `"a,b",c` is `["a,b", "c"]`.
/// Whatever is still accumulating when the line ends is flushed as the last
/// field.
pub fn parse_line(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut inside_quote = false;
    // Set when a closing quote already flushed the field
    let mut field_closed = false;

    for c in line.chars() {
        match c {
            '"' if !inside_quote => {
                inside_quote = true;
                field_closed = false;
            }
            '"' => {
                fields.push(current.trim().to_string());
                current.clear();
                inside_quote = false;
                field_closed = true;
            }
            ',' if !inside_quote => {
                if field_closed {
                    // Stray text between the closing quote and the comma is dropped
                    current.clear();
                } else {
                    fields.push(current.trim().to_string());
                    current.clear();
                }
                field_closed = false;
            }
            _ => current.push(c),
        }
    }

    if !field_closed {
        fields.push(current.trim().to_string());
    }

    fields
}

/// A CSV document as an ordered list of raw lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvDocument {
    lines: Vec<String>,
}

impl CsvDocument {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Read a document from disk. A missing file is reported as
    /// [`VolleyError::CsvMissing`], anything else as [`VolleyError::CsvLoad`].
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::from_text(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VolleyError::CsvMissing),
            Err(e) => Err(VolleyError::CsvLoad(e.to_string())),
        }
    }

    /// Data lines: the header is dropped, as is one trailing blank line.
    pub fn data_lines(&self) -> &[String] {
        let Some((_, mut data)) = self.lines.split_first() else {
            return &[];
        };
        if let Some((last, rest)) = data.split_last()
            && last.trim_end_matches('\r').is_empty()
        {
            data = rest;
        }
        data
    }

    /// Parse every data line into a [`Row`].
    pub fn rows(&self) -> Vec<Row> {
        self.data_lines()
            .iter()
            .enumerate()
            .map(|(index, line)| Row::new(index, parse_line(line)))
            .collect()
    }
}
