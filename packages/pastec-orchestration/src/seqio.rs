//! Sequence collections (FASTA files)
//!
//! A collection is identified by its path and never modified in place: every
//! operation that changes sequences writes a new file.

use crate::error::{PipelineError, Result};
use bio::io::fasta;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// An ordered set of named sequences backed by a FASTA file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceCollection {
    path: PathBuf,
}

impl SequenceCollection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn reader(&self) -> Result<fasta::Reader<BufReader<File>>> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::MissingArtifact(format!("{} ({})", self.path.display(), e))
        })?;
        Ok(fasta::Reader::new(file))
    }

    /// All records, in file order
    pub fn records(&self) -> Result<Vec<fasta::Record>> {
        let mut records = Vec::new();
        for record in self.reader()?.records() {
            records.push(record?);
        }
        Ok(records)
    }

    /// Sequence identifiers, in file order
    pub fn ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for record in self.reader()?.records() {
            ids.push(record?.id().to_string());
        }
        Ok(ids)
    }

    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for record in self.reader()?.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Reject headers with characters outside `a-z A-Z 0-9 - . : _`.
    ///
    /// Every offending header is reported, not only the first one.
    pub fn validate_headers(&self) -> Result<()> {
        let mut offending = Vec::new();
        for record in self.reader()?.records() {
            let record = record?;
            let header = full_header(&record);
            if header.is_empty() || !header.chars().all(is_authorized_header_char) {
                offending.push(header);
            }
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation {
                file: self.path.clone(),
                headers: offending,
            })
        }
    }
}

fn is_authorized_header_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '_')
}

fn full_header(record: &fasta::Record) -> String {
    match record.desc() {
        Some(desc) => format!("{} {}", record.id(), desc),
        None => record.id().to_string(),
    }
}

/// Write records to `path`, replacing any previous content
pub fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a fasta::Record>,
) -> Result<usize> {
    let mut writer = fasta::Writer::to_file(path)?;
    let mut written = 0;
    for record in records {
        writer.write_record(record)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// Write `(id, seq)` pairs as FASTA
    pub fn write_fasta(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let mut content = String::new();
        for (id, seq) in entries {
            content.push_str(&format!(">{}\n{}\n", id, seq));
        }
        std::fs::write(path, content).unwrap();
        path.to_path_buf()
    }
}
