use std::collections::BTreeMap;
use std::fmt;

/// One configured source for the current tick.
///
/// Sources carry no identity beyond their position in the configuration;
/// the list is re-read on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub position: usize,
    /// Path or identifier of the mapping document.
    pub locator: String,
}

impl Source {
    pub fn new(position: usize, locator: impl Into<String>) -> Self {
        Self {
            position,
            locator: locator.into(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.position, self.locator)
    }
}

/// Values extracted from one document, destined for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Destination database name (from the connection parameters).
    pub database: String,
    pub table: String,
    /// Field name -> extracted value, in column order.
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Record {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Identifier of an inserted row, rendered as text regardless of the
/// column's SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedId(pub String);

impl InsertedId {
    const DRY_RUN: &'static str = "dry-run";

    /// Placeholder id for a record that was assembled but not stored.
    pub fn dry_run() -> Self {
        Self(Self::DRY_RUN.to_string())
    }

    pub fn is_dry_run(&self) -> bool {
        self.0 == Self::DRY_RUN
    }
}

impl fmt::Display for InsertedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
