//! In-memory reference table.
//!
//! Loaded once at startup and shared read-only by every request. Canonical
//! keys are computed at load; the table is never mutated afterwards, so they
//! never go stale.

mod loader;

pub use loader::*;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::DrugRecord;
use crate::resolver::normalize;

/// Table loading errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column: {0}")]
    MissingColumn(&'static str),

    #[error("Reference table has no rows")]
    Empty,

    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),
}

pub type TableResult<T> = Result<T, TableError>;

/// A record together with its precomputed comparison keys.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub record: DrugRecord,
    pub product_key: String,
    pub generic_key: String,
}

impl TableEntry {
    fn new(record: DrugRecord) -> Self {
        Self {
            product_key: normalize(&record.product_name),
            generic_key: normalize(&record.generic_name),
            record,
        }
    }
}

/// Immutable snapshot of the washout reference table.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<TableEntry>,
    source: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl ReferenceTable {
    /// Build a table from records, keeping their order.
    ///
    /// An empty record set is rejected.
    pub fn from_records(records: Vec<DrugRecord>) -> TableResult<Self> {
        if records.is_empty() {
            return Err(TableError::Empty);
        }

        Ok(Self {
            entries: records.into_iter().map(TableEntry::new).collect(),
            source: None,
            loaded_at: Utc::now(),
        })
    }

    /// Load from a file, choosing the format by extension (`.csv` or `.json`).
    pub fn load<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let path = path.as_ref();
        let records = read_records(path)?;
        let mut table = Self::from_records(records)?;
        table.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            records = table.len(),
            restricted = table.restricted_count(),
            "Loaded reference table"
        );

        Ok(table)
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Records in table order.
    pub fn records(&self) -> impl Iterator<Item = &DrugRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records with a withdrawal period.
    pub fn restricted_count(&self) -> usize {
        self.records().filter(|r| r.is_restricted()).count()
    }

    /// File the table was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_precomputed() {
        let table = ReferenceTable::from_records(vec![DrugRecord::new(
            "バファリン「A」",
            "アスピリン ８１",
            Some("7日間"),
        )])
        .unwrap();

        let entry = &table.entries()[0];
        assert_eq!(entry.product_key, "バファリン");
        assert_eq!(entry.generic_key, "アスピリン81");
        assert_eq!(entry.record.product_name, "バファリン「A」");
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            ReferenceTable::from_records(vec![]),
            Err(TableError::Empty)
        ));
    }

    #[test]
    fn test_restricted_count() {
        let table = ReferenceTable::from_records(vec![
            DrugRecord::new("A", "a", Some("3日")),
            DrugRecord::new("B", "b", None),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.restricted_count(), 1);
        assert!(table.source().is_none());
    }
}
