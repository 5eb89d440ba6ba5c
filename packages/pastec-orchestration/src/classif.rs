//! Classification files (`.classif`)
//!
//! One tab-separated line per sequence: name, length, strand, chimeric status,
//! class, order, completeness, evidence. Records keep every raw column so that
//! rewriting a file only touches the columns a stage changes.

use crate::error::{PipelineError, Result};
use crate::seqio::SequenceCollection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const STRAND_COLUMN: usize = 2;
const CLASS_COLUMN: usize = 4;
const ORDER_COLUMN: usize = 5;

/// Label used for sequences without a class
pub const NO_CATEGORY: &str = "noCat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRecord {
    fields: Vec<String>,
}

impl ClassificationRecord {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }
        Some(Self {
            fields: line.split('\t').map(str::to_string).collect(),
        })
    }

    pub fn seq_name(&self) -> &str {
        &self.fields[0]
    }

    fn column(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
    }

    pub fn strand(&self) -> Option<&str> {
        self.column(STRAND_COLUMN)
    }

    pub fn is_reverse_strand(&self) -> bool {
        self.strand() == Some("-")
    }

    pub fn set_strand(&mut self, strand: &str) {
        if self.fields.len() <= STRAND_COLUMN {
            self.fields.resize(STRAND_COLUMN + 1, String::new());
        }
        self.fields[STRAND_COLUMN] = strand.to_string();
    }

    pub fn class_label(&self) -> &str {
        self.column(CLASS_COLUMN).unwrap_or(NO_CATEGORY)
    }

    pub fn order(&self) -> &str {
        self.column(ORDER_COLUMN).unwrap_or(NO_CATEGORY)
    }

    pub fn is_unclassified(&self) -> bool {
        self.class_label() == NO_CATEGORY
    }

    pub fn to_line(&self) -> String {
        self.fields.join("\t")
    }
}

pub fn read_records(path: &Path) -> Result<Vec<ClassificationRecord>> {
    let file = File::open(path)
        .map_err(|e| PipelineError::MissingArtifact(format!("{} ({})", path.display(), e)))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        if let Some(record) = ClassificationRecord::parse(&line?) {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a ClassificationRecord>,
) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for record in records {
        writeln!(writer, "{}", record.to_line())?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Summary statistics of one classification file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifSummary {
    pub classif_file: String,
    pub total: usize,
    pub unclassified: usize,
    pub reverse_strand: usize,
    pub by_class: BTreeMap<String, usize>,
    pub by_order: BTreeMap<String, usize>,
}

impl ClassifSummary {
    pub fn from_records(classif_file: &Path, records: &[ClassificationRecord]) -> Self {
        let mut summary = Self {
            classif_file: classif_file.display().to_string(),
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            if record.is_unclassified() {
                summary.unclassified += 1;
            }
            if record.is_reverse_strand() {
                summary.reverse_strand += 1;
            }
            *summary
                .by_class
                .entry(record.class_label().to_string())
                .or_default() += 1;
            *summary.by_order.entry(record.order().to_string()).or_default() += 1;
        }
        summary
    }
}

/// Every sequence has exactly one record and every record names a sequence.
pub fn verify_consistency(sequences: &SequenceCollection, classif_path: &Path) -> Result<()> {
    let ids = sequences.ids()?;
    let records = read_records(classif_path)?;

    let inconsistent = |reason: String| PipelineError::InconsistentArtifacts {
        sequence_path: sequences.path().to_path_buf(),
        classif_path: classif_path.to_path_buf(),
        reason,
    };

    let mut per_name: HashMap<&str, usize> = HashMap::new();
    for record in &records {
        *per_name.entry(record.seq_name()).or_default() += 1;
    }

    let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();

    let missing: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !per_name.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(inconsistent(format!(
            "sequences without classification: {}",
            missing.join(", ")
        )));
    }

    let mut duplicated: Vec<&str> = per_name
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(&name, _)| name)
        .collect();
    if !duplicated.is_empty() {
        duplicated.sort_unstable();
        return Err(inconsistent(format!(
            "sequences classified more than once: {}",
            duplicated.join(", ")
        )));
    }

    let mut orphans: Vec<&str> = per_name
        .keys()
        .copied()
        .filter(|name| !id_set.contains(name))
        .collect();
    if !orphans.is_empty() {
        orphans.sort_unstable();
        return Err(inconsistent(format!(
            "records without sequence: {}",
            orphans.join(", ")
        )));
    }

    Ok(())
}
