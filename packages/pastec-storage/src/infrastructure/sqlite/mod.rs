//! SQLite adapter for PersistentStore
//!
//! Rusqlite connections are blocking, so every operation runs on the blocking
//! pool behind a shared `Mutex<Connection>`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bio::io::fasta;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::domain::{validate_table_name, ClassifRow, PersistentStore, SeqRow, TableKind};
use crate::{Result, StorageError};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened SQLite store at {}", path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::database(format!("SQLite task failed: {}", e)))?
    }
}

fn table_exists_blocking(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn read_classif_rows(source: &Path) -> Result<Vec<ClassifRow>> {
    let reader = BufReader::new(File::open(source)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        if let Some(row) = ClassifRow::parse_line(&line?)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn read_seq_rows(source: &Path) -> Result<Vec<SeqRow>> {
    let reader = fasta::Reader::new(File::open(source)?);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(SeqRow {
            accession: record.id().to_string(),
            description: record.desc().unwrap_or_default().to_string(),
            sequence: String::from_utf8_lossy(record.seq()).into_owned(),
            length: record.seq().len() as i64,
        });
    }
    Ok(rows)
}

fn create_table_blocking(
    conn: &mut Connection,
    table: &str,
    kind: TableKind,
    source: &Path,
    overwrite: bool,
) -> Result<usize> {
    validate_table_name(table)?;

    if table_exists_blocking(conn, table)? && !overwrite {
        return Err(StorageError::table_exists(table));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;

    let loaded = match kind {
        TableKind::Classif => {
            let rows = read_classif_rows(source)?;
            tx.execute_batch(&format!(
                "CREATE TABLE {} (
                    seq_name TEXT NOT NULL,
                    length INTEGER,
                    strand TEXT,
                    status TEXT,
                    class_name TEXT,
                    class_order TEXT,
                    completeness TEXT,
                    evidence TEXT
                )",
                table
            ))?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    table
                ))?;
                for row in &rows {
                    stmt.execute(params![
                        row.seq_name,
                        row.length,
                        row.strand,
                        row.status,
                        row.class_name,
                        row.class_order,
                        row.completeness,
                        row.evidence,
                    ])?;
                }
            }
            rows.len()
        }
        TableKind::Seq => {
            let rows = read_seq_rows(source)?;
            tx.execute_batch(&format!(
                "CREATE TABLE {} (
                    accession TEXT NOT NULL,
                    description TEXT,
                    sequence TEXT,
                    length INTEGER
                )",
                table
            ))?;
            {
                let mut stmt =
                    tx.prepare(&format!("INSERT INTO {} VALUES (?1, ?2, ?3, ?4)", table))?;
                for row in &rows {
                    stmt.execute(params![row.accession, row.description, row.sequence, row.length])?;
                }
            }
            rows.len()
        }
    };

    tx.commit()?;
    Ok(loaded)
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn create_table(
        &self,
        table: &str,
        kind: TableKind,
        source: &Path,
        overwrite: bool,
    ) -> Result<usize> {
        let table = table.to_string();
        let source: PathBuf = source.to_path_buf();
        let name = table.clone();

        let loaded = self
            .with_conn(move |conn| create_table_blocking(conn, &table, kind, &source, overwrite))
            .await?;

        info!("Created {} table {} with {} rows", kind, name, loaded);
        Ok(loaded)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        validate_table_name(table)?;
        let table = table.to_string();
        self.with_conn(move |conn| table_exists_blocking(conn, &table))
            .await
    }

    async fn row_count(&self, table: &str) -> Result<usize> {
        validate_table_name(table)?;
        let table = table.to_string();
        self.with_conn(move |conn| {
            if !table_exists_blocking(conn, &table)? {
                return Err(StorageError::table_not_found(&table));
            }
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        })
        .await
    }
}
