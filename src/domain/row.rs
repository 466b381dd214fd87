//! Parsed CSV rows.

use serde::{Deserialize, Serialize};

/// One data line of the CSV, split into trimmed fields.
///
/// `index` is the zero-based position among data rows (the header is not
/// counted) and is what results are ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub index: usize,
    pub fields: Vec<String>,
}

impl Row {
    pub fn new(index: usize, fields: Vec<String>) -> Self {
        Self { index, fields }
    }

    /// Field at `position`, or `""` when the row is shorter.
    pub fn field(&self, position: usize) -> &str {
        self.fields.get(position).map(String::as_str).unwrap_or("")
    }

    /// Optional column lookup; absent columns read as `""`.
    pub fn column(&self, position: Option<usize>) -> &str {
        position.map(|p| self.field(p)).unwrap_or("")
    }

    /// The row's value at `position` unless it is empty, in which case the
    /// script default applies.
    pub fn effective<'a>(&'a self, position: usize, default: &'a str) -> &'a str {
        let value = self.field(position);
        if value.is_empty() { default } else { value }
    }
}
