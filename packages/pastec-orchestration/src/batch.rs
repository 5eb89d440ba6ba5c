use crate::error::{PipelineError, Result};
use crate::seqio::SequenceCollection;
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const BATCHES_DIR: &str = "batches";
pub const BATCH_PREFIX: &str = "batch_";

/// Sequences per batch for `total` sequences spread over at most `max_jobs` jobs
///
/// `max_jobs == 0` means no limit. When the request exceeds useful granularity
/// the batch size falls back to `min_batch`.
pub fn plan_batch_size(total: usize, max_jobs: usize, min_batch: usize) -> usize {
    if max_jobs == 0 || total / max_jobs <= 1 {
        min_batch
    } else {
        total / max_jobs + 1
    }
}

/// One contiguous slice of the input collection, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub path: PathBuf,
    pub sequence_count: usize,
}

impl Batch {
    pub fn file_name(&self) -> String {
        batch_file_name(self.index)
    }
}

pub fn batch_file_name(index: usize) -> String {
    format!("{}{}.fa", BATCH_PREFIX, index)
}

/// Splits a collection into ordered batch files under `<work_dir>/batches`
pub struct BatchPlanner {
    batches_dir: PathBuf,
}

impl BatchPlanner {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            batches_dir: work_dir.join(BATCHES_DIR),
        }
    }

    pub fn batches_dir(&self) -> &Path {
        &self.batches_dir
    }

    /// Write `batch_1.fa`, `batch_2.fa`, ... each holding at most `batch_size`
    /// sequences, in input order. Stale batch files from a previous split are removed.
    pub fn split(&self, source: &SequenceCollection, batch_size: usize) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(PipelineError::Planning("batch size must be at least 1".to_string()));
        }

        if self.batches_dir.exists() {
            debug!("Removing stale batches in {}", self.batches_dir.display());
            std::fs::remove_dir_all(&self.batches_dir)?;
        }
        std::fs::create_dir_all(&self.batches_dir)?;

        let mut batches: Vec<Batch> = Vec::new();
        let mut writer: Option<fasta::Writer<File>> = None;

        for record in source.reader()?.records() {
            let record = record?;

            let full = batches
                .last()
                .map_or(true, |b| b.sequence_count >= batch_size);
            if full {
                if let Some(mut w) = writer.take() {
                    w.flush()?;
                }
                let index = batches.len() + 1;
                let path = self.batches_dir.join(batch_file_name(index));
                writer = Some(fasta::Writer::to_file(&path)?);
                batches.push(Batch {
                    index,
                    path,
                    sequence_count: 0,
                });
            }

            if let (Some(w), Some(batch)) = (writer.as_mut(), batches.last_mut()) {
                w.write_record(&record)?;
                batch.sequence_count += 1;
            }
        }

        if let Some(mut w) = writer.take() {
            w.flush()?;
        }

        if batches.is_empty() {
            return Err(PipelineError::Planning(format!(
                "directory '{}' is empty after splitting {}",
                self.batches_dir.display(),
                source.path().display()
            )));
        }

        info!(
            "Split {} into {} batches of at most {} sequences",
            source.path().display(),
            batches.len(),
            batch_size
        );
        Ok(batches)
    }
}
