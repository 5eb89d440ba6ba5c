//! Persistent store for PASTEC classification results
//!
//! The pipeline persists exactly one thing: the final classification file of a run,
//! loaded as a table named `<project>_consensus_classif`. This crate holds the port
//! (`PersistentStore`) and its SQLite adapter.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pastec_storage::{PersistentStore, SqliteStore, TableKind};
//!
//! let store = SqliteStore::open("pastec.db")?;
//! let rows = store
//!     .create_table("DmelChr4_consensus_classif", TableKind::Classif, "DmelChr4.classif".as_ref(), true)
//!     .await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{validate_table_name, ClassifRow, PersistentStore, SeqRow, TableKind};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteStore;
