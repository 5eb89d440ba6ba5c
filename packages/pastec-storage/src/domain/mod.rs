//! Domain layer for the classification store
//!
//! # Domain Models
//!
//! - `TableKind`: what a source artifact holds (`classif` or `seq`)
//! - `ClassifRow`: one line of a PASTEC `.classif` file
//! - `SeqRow`: one FASTA record
//!
//! # Port Trait
//!
//! - `PersistentStore`: table creation from a source artifact

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of table created from a source artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Tab-separated classification file
    Classif,
    /// FASTA sequence file
    Seq,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Classif => "classif",
            TableKind::Seq => "seq",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "classif" => Ok(TableKind::Classif),
            "seq" | "fasta" => Ok(TableKind::Seq),
            _ => Err(StorageError::parse(format!("Invalid table kind: {}", s))),
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of a classification file
///
/// Column layout (tab-separated): sequence name, length, strand, chimeric status,
/// class, order, completeness, evidence. Only the name is mandatory; missing
/// trailing columns are stored as NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifRow {
    pub seq_name: String,
    pub length: Option<i64>,
    pub strand: Option<String>,
    pub status: Option<String>,
    pub class_name: Option<String>,
    pub class_order: Option<String>,
    pub completeness: Option<String>,
    pub evidence: Option<String>,
}

impl ClassifRow {
    /// Parse one line. Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.split('\t');
        let seq_name = fields.next().unwrap_or_default().trim().to_string();
        if seq_name.is_empty() {
            return Err(StorageError::parse(format!(
                "Classification row without sequence name: '{}'",
                line
            )));
        }

        let mut column = || {
            fields
                .next()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
        };

        let length = match column() {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                StorageError::parse(format!("Invalid length '{}' for {}", raw, seq_name))
            })?),
            None => None,
        };

        Ok(Some(Self {
            seq_name,
            length,
            strand: column(),
            status: column(),
            class_name: column(),
            class_order: column(),
            completeness: column(),
            evidence: column(),
        }))
    }
}

/// One FASTA record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqRow {
    pub accession: String,
    pub description: String,
    pub sequence: String,
    pub length: i64,
}

/// Table names are interpolated into SQL, so they are restricted to `[A-Za-z0-9_]`.
pub fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StorageError::invalid_table_name(table));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: PersistentStore
// ═══════════════════════════════════════════════════════════════════════════

/// Long-term store for pipeline results
///
/// # Implementations
///
/// - `SqliteStore`: SQLite adapter
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Create `table` and load every row of `source` into it
    ///
    /// # Errors
    ///
    /// - `InvalidTableName` if the name is outside `[A-Za-z0-9_]`
    /// - `TableExists` if the table exists and `overwrite` is false
    /// - `Parse` / `IO` if the source artifact cannot be read
    ///
    /// # Returns
    ///
    /// Number of rows loaded
    async fn create_table(
        &self,
        table: &str,
        kind: TableKind,
        source: &Path,
        overwrite: bool,
    ) -> Result<usize>;

    /// Whether `table` exists
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Number of rows in `table`
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if the table doesn't exist
    async fn row_count(&self, table: &str) -> Result<usize>;
}
