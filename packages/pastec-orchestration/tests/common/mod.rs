//! Shared fixtures for the integration tests
//!
//! In-process collaborators stand in for the external tools so that a whole run
//! can execute in a temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use pastec_orchestration::collaborators::{
    BestHitAnnotator, Classifier, ClassifierStep, FeatureDetection, FeatureDetector,
    HeaderAnnotator, JsonStatsReporter, RedundancyRemover, RevCompStrandNormalizer,
    UniqueClassifReconciler,
};
use pastec_orchestration::seqio::{self, SequenceCollection};
use pastec_orchestration::{
    artifact, ArtifactPair, Collaborators, Config, Result, StageContext,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const PROJECT: &str = "proj";

pub fn config_yaml(
    remove_redundancy: bool,
    rev_complement: bool,
    add_wicker_code: bool,
    add_nocat: bool,
) -> String {
    format!(
        r#"
project:
  project_name: {}
classif_consensus:
  clean: false
  remove_redundancy: {}
  rev_complement: {}
  add_wicker_code: {}
  add_noCat_bestHitClassif: {}
"#,
        PROJECT, remove_redundancy, rev_complement, add_wicker_code, add_nocat
    )
}

/// Write the configuration next to the run and load it from there
pub fn write_config(dir: &Path, yaml: &str) -> Config {
    let path = dir.join("pastec.yml");
    std::fs::write(&path, yaml).unwrap();
    Config::from_yaml(&path).unwrap()
}

pub fn write_fasta(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let mut content = String::new();
    for (id, seq) in entries {
        content.push_str(&format!(">{}\n{}\n", id, seq));
    }
    std::fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// Consensus set with a redundant copy and a reverse-strand element
pub fn consensus_fasta(dir: &Path) -> PathBuf {
    write_fasta(
        &dir.join("consensus.fa"),
        &[
            ("cons1", "ACGTACGTAA"),
            ("dup_cons1", "ACGTACGTAA"),
            ("rev_cons2", "AAAACCCGGT"),
            ("cons3", "TTTTGGGGCA"),
        ],
    )
}

#[derive(Default)]
pub struct CountingDetector {
    pub calls: AtomicUsize,
}

#[async_trait]
impl FeatureDetector for CountingDetector {
    async fn run(&self, _sequences: &SequenceCollection, _ctx: &StageContext) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One record per sequence; names starting with `rev` are on the `-` strand and
/// names starting with `nocat` are unclassified
#[derive(Default)]
pub struct PrefixClassifier {
    pub steps: parking_lot::Mutex<Vec<ClassifierStep>>,
    pub write_nothing: bool,
    /// Extra record naming a sequence that is not in the input
    pub orphan: Option<&'static str>,
}

pub fn classif_line(id: &str, len: usize) -> String {
    let strand = if id.starts_with("rev") { "-" } else { "+" };
    let (class, order) = if id.starts_with("nocat") {
        ("noCat", "noCat")
    } else {
        ("I", "LTR")
    };
    format!("{}\t{}\t{}\tok\t{}\t{}\tcomplete\tCI=100", id, len, strand, class, order)
}

#[async_trait]
impl Classifier for PrefixClassifier {
    async fn run(
        &self,
        sequences: &SequenceCollection,
        ctx: &StageContext,
        step: ClassifierStep,
    ) -> Result<PathBuf> {
        self.steps.lock().push(step);
        let classif = artifact::merged_classif(&ctx.work_dir, &ctx.project);
        if self.write_nothing || !step.produces_classification() {
            return Ok(classif);
        }

        let mut content = String::new();
        for record in sequences.records()? {
            content.push_str(&classif_line(record.id(), record.seq().len()));
            content.push('\n');
        }
        if let Some(name) = self.orphan {
            content.push_str(&classif_line(name, 10));
            content.push('\n');
        }
        std::fs::write(&classif, content)?;
        Ok(classif)
    }
}

/// Drops every sequence whose name starts with `dup`
pub struct PrefixRedundancyRemover;

#[async_trait]
impl RedundancyRemover for PrefixRedundancyRemover {
    async fn run(
        &self,
        sequences: &SequenceCollection,
        _classif: &Path,
        output: &Path,
        _ctx: &StageContext,
    ) -> Result<SequenceCollection> {
        let kept: Vec<_> = sequences
            .records()?
            .into_iter()
            .filter(|r| !r.id().starts_with("dup"))
            .collect();
        seqio::write_records(output, &kept)?;
        Ok(SequenceCollection::new(output))
    }
}

/// Copies the pair and tags the last column of every record
pub struct TaggingAnnotator {
    pub tag: &'static str,
}

impl TaggingAnnotator {
    fn annotate(&self, input: &ArtifactPair, output: &ArtifactPair) -> Result<ArtifactPair> {
        std::fs::copy(&input.sequence_path, &output.sequence_path)?;
        let classif = std::fs::read_to_string(&input.classif_path)?;
        let tagged: String = classif
            .lines()
            .map(|line| format!("{};{}\n", line, self.tag))
            .collect();
        std::fs::write(&output.classif_path, tagged)?;
        Ok(output.clone())
    }
}

#[async_trait]
impl HeaderAnnotator for TaggingAnnotator {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        _ctx: &StageContext,
    ) -> Result<ArtifactPair> {
        self.annotate(input, output)
    }
}

#[async_trait]
impl BestHitAnnotator for TaggingAnnotator {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        _ctx: &StageContext,
    ) -> Result<ArtifactPair> {
        self.annotate(input, output)
    }
}

pub struct Fakes {
    pub detector: Arc<CountingDetector>,
    pub classifier: Arc<PrefixClassifier>,
    pub collaborators: Collaborators,
}

pub fn fakes_with(classifier: PrefixClassifier) -> Fakes {
    let detector = Arc::new(CountingDetector::default());
    let classifier = Arc::new(classifier);
    let collaborators = Collaborators {
        feature_detection: FeatureDetection::Sequential(detector.clone()),
        classifier: classifier.clone(),
        stats: Arc::new(JsonStatsReporter),
        redundancy_remover: Arc::new(PrefixRedundancyRemover),
        reconciler: Arc::new(UniqueClassifReconciler),
        strand_normalizer: Arc::new(RevCompStrandNormalizer),
        header_annotator: Arc::new(TaggingAnnotator { tag: "wicker" }),
        best_hit_annotator: Arc::new(TaggingAnnotator { tag: "besthit" }),
    };
    Fakes {
        detector,
        classifier,
        collaborators,
    }
}

pub fn fakes() -> Fakes {
    fakes_with(PrefixClassifier::default())
}
