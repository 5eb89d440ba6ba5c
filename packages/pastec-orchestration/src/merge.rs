use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub destination: PathBuf,
    /// Merged parts, in ascending ordinal order
    pub parts: Vec<PathBuf>,
    pub bytes_written: u64,
    pub cleaned: bool,
}

/// Concatenates per-batch artifacts (`<prefix><n>`) into one file
pub struct ResultMerger {
    dir: PathBuf,
    batches_dir: Option<PathBuf>,
}

impl ResultMerger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            batches_dir: None,
        }
    }

    /// Directory removed together with the parts on cleanup
    pub fn with_batches_dir(mut self, batches_dir: impl Into<PathBuf>) -> Self {
        self.batches_dir = Some(batches_dir.into());
        self
    }

    /// Files in the merge directory named `prefix` followed by digits, ordered by
    /// their numeric suffix (so `_10` comes after `_9`)
    pub fn parts(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut parts: Vec<(u64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(ordinal) = name
                .to_str()
                .and_then(|n| n.strip_prefix(prefix))
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            parts.push((ordinal, entry.path()));
        }
        parts.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(parts.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete every existing part, so that a new run only merges its own outputs
    pub fn discard(&self, prefix: &str) -> Result<usize> {
        let parts = self.parts(prefix)?;
        for part in &parts {
            std::fs::remove_file(part)?;
        }
        if !parts.is_empty() {
            info!(
                "Removed {} stale '{}*' parts from {}",
                parts.len(),
                prefix,
                self.dir.display()
            );
        }
        Ok(parts.len())
    }

    /// Concatenate every part into `destination`, replacing its content.
    ///
    /// With `cleanup`, the parts and the batches directory are deleted once the
    /// merged file is fully written; on failure nothing is deleted.
    pub fn merge(&self, prefix: &str, destination: &Path, cleanup: bool) -> Result<MergeReport> {
        let parts = self.parts(prefix)?;
        if parts.is_empty() {
            return Err(PipelineError::MissingArtifact(format!(
                "no '{}*' files to merge in {}",
                prefix,
                self.dir.display()
            )));
        }

        let mut writer = BufWriter::new(File::create(destination)?);
        let mut bytes_written = 0;
        for part in &parts {
            let mut reader = BufReader::new(File::open(part)?);
            bytes_written += std::io::copy(&mut reader, &mut writer)?;
            debug!("Merged {}", part.display());
        }
        writer.flush()?;

        info!(
            "Merged {} parts into {} ({} bytes)",
            parts.len(),
            destination.display(),
            bytes_written
        );

        if cleanup {
            for part in &parts {
                std::fs::remove_file(part)?;
            }
            if let Some(batches_dir) = &self.batches_dir {
                if batches_dir.exists() {
                    std::fs::remove_dir_all(batches_dir)?;
                }
            }
            debug!("Removed {} merged parts", parts.len());
        }

        Ok(MergeReport {
            destination: destination.to_path_buf(),
            parts,
            bytes_written,
            cleaned: cleanup,
        })
    }
}
