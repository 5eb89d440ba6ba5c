use crate::seqio::SequenceCollection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FASTA_EXT: &str = "fa";
pub const CLASSIF_EXT: &str = "classif";

/// Suffixes appended by the post-processing stages
pub const NEG_STRAND_REVERSED_SUFFIX: &str = "_negStrandReversed";
pub const WICKER_SUFFIX: &str = "_WickerH";
pub const NOCAT_BEST_HIT_SUFFIX: &str = "_noCatBestHit";
pub const WITHOUT_REDUNDANCY_SUFFIX: &str = "_withoutRedundancy";

/// (sequence file, classification file) threaded through the stage chain
///
/// Pairs produced by a stage share a base name and differ only by extension, so
/// the lineage of an artifact can be read from its file name. The pair entering
/// the chain does not: it joins the input sequences with `<project>.classif`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactPair {
    pub sequence_path: PathBuf,
    pub classif_path: PathBuf,
}

impl ArtifactPair {
    /// Pair named `<dir>/<base>.fa` and `<dir>/<base>.classif`
    pub fn from_base(dir: &Path, base: &str) -> Self {
        Self {
            sequence_path: dir.join(format!("{}.{}", base, FASTA_EXT)),
            classif_path: dir.join(format!("{}.{}", base, CLASSIF_EXT)),
        }
    }

    /// Pair of an existing sequence file and the classification produced for it,
    /// wherever both live
    pub fn for_sequences(sequence_path: impl Into<PathBuf>, classif_path: impl Into<PathBuf>) -> Self {
        Self {
            sequence_path: sequence_path.into(),
            classif_path: classif_path.into(),
        }
    }

    /// Output pair of a stage that appends `suffix` to the current base name
    pub fn derive(&self, work_dir: &Path, suffix: &str) -> Self {
        Self::from_base(work_dir, &format!("{}{}", self.base_name(), suffix))
    }

    /// Sequence file name without directory and extension
    pub fn base_name(&self) -> String {
        base_name_of(&self.sequence_path)
    }

    pub fn shares_base_name(&self) -> bool {
        base_name_of(&self.sequence_path) == base_name_of(&self.classif_path)
    }

    pub fn sequences(&self) -> SequenceCollection {
        SequenceCollection::new(&self.sequence_path)
    }
}

impl std::fmt::Display for ArtifactPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {})",
            self.sequence_path.display(),
            self.classif_path.display()
        )
    }
}

/// The single place that strips an extension from an artifact name
pub fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Output pair of redundancy removal: `<project>_withoutRedundancy.{fa,classif}`
pub fn without_redundancy(work_dir: &Path, project: &str) -> ArtifactPair {
    ArtifactPair::from_base(work_dir, &format!("{}{}", project, WITHOUT_REDUNDANCY_SUFFIX))
}

/// Merged classification file of the parallel path
pub fn merged_classif(work_dir: &Path, project: &str) -> PathBuf {
    work_dir.join(format!("{}.{}", project, CLASSIF_EXT))
}

/// Published alias of the final sequence collection
pub fn library_alias(work_dir: &Path, project: &str) -> PathBuf {
    work_dir.join(format!("{}_denovoLibTEs.{}", project, FASTA_EXT))
}

/// Name of the table holding the final classification
pub fn consensus_table(project: &str) -> String {
    format!("{}_consensus_classif", project)
}
