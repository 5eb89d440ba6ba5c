use super::{ClassificationReconciler, StatsReporter, StrandNormalizer};
use crate::artifact::ArtifactPair;
use crate::classif::{self, ClassifSummary, ClassificationRecord};
use crate::error::{PipelineError, Result};
use crate::seqio::{self, SequenceCollection};
use async_trait::async_trait;
use bio::alphabets::dna;
use bio::io::fasta;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes the summary of a classification file next to it as `<classif>_stats.json`
pub struct JsonStatsReporter;

impl JsonStatsReporter {
    pub fn stats_path(classif: &Path) -> PathBuf {
        let mut name = classif.file_name().unwrap_or_default().to_os_string();
        name.push("_stats.json");
        classif.with_file_name(name)
    }
}

#[async_trait]
impl StatsReporter for JsonStatsReporter {
    async fn report(&self, classif: &Path) -> Result<ClassifSummary> {
        let records = classif::read_records(classif)?;
        let summary = ClassifSummary::from_records(classif, &records);

        let path = Self::stats_path(classif);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &summary)?;

        info!(
            "{}: {} sequences, {} unclassified, {} classes",
            classif.display(),
            summary.total,
            summary.unclassified,
            summary.by_class.len()
        );
        Ok(summary)
    }
}

/// Keeps one record per surviving sequence, in sequence order
pub struct UniqueClassifReconciler;

#[async_trait]
impl ClassificationReconciler for UniqueClassifReconciler {
    async fn run(
        &self,
        deduped: &SequenceCollection,
        classif: &Path,
        output: &Path,
    ) -> Result<PathBuf> {
        let ids = deduped.ids()?;
        let records = classif::read_records(classif)?;

        let mut by_name: HashMap<&str, &ClassificationRecord> = HashMap::new();
        for record in &records {
            by_name.entry(record.seq_name()).or_insert(record);
        }

        let mut kept = Vec::with_capacity(ids.len());
        let mut unmatched = Vec::new();
        for id in &ids {
            match by_name.get(id.as_str()) {
                Some(record) => kept.push(*record),
                None => unmatched.push(id.as_str()),
            }
        }

        if !unmatched.is_empty() {
            return Err(PipelineError::InconsistentArtifacts {
                sequence_path: deduped.path().to_path_buf(),
                classif_path: classif.to_path_buf(),
                reason: format!("no classification for {}", unmatched.join(", ")),
            });
        }

        classif::write_records(output, kept)?;
        debug!(
            "Reconciled {} of {} records into {}",
            ids.len(),
            records.len(),
            output.display()
        );
        Ok(output.to_path_buf())
    }
}

/// Reverse-complements sequences classified on the `-` strand
pub struct RevCompStrandNormalizer;

#[async_trait]
impl StrandNormalizer for RevCompStrandNormalizer {
    async fn run(&self, input: &ArtifactPair, output: &ArtifactPair) -> Result<ArtifactPair> {
        let mut records = classif::read_records(&input.classif_path)?;

        let reverse: HashSet<String> = records
            .iter()
            .filter(|r| r.is_reverse_strand())
            .map(|r| r.seq_name().to_string())
            .collect();

        let mut sequences = Vec::new();
        for record in input.sequences().records()? {
            if reverse.contains(record.id()) {
                let reoriented = dna::revcomp(record.seq());
                sequences.push(fasta::Record::with_attrs(
                    record.id(),
                    record.desc(),
                    &reoriented,
                ));
            } else {
                sequences.push(record);
            }
        }

        for record in records.iter_mut().filter(|r| r.is_reverse_strand()) {
            record.set_strand("+");
        }

        seqio::write_records(&output.sequence_path, &sequences)?;
        classif::write_records(&output.classif_path, &records)?;

        info!(
            "Reversed {} sequences on the negative strand into {}",
            reverse.len(),
            output.sequence_path.display()
        );
        Ok(output.clone())
    }
}
