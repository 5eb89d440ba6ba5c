//! Contracts of the external collaborators the pipeline drives
//!
//! The pipeline only sequences these calls and threads their artifacts; what a
//! classifier or a redundancy remover does internally is not its concern.
//! `external` runs configured tools, `native` implements the collaborators whose
//! logic is plain file rewriting.

pub mod external;
pub mod native;

use crate::artifact::ArtifactPair;
use crate::classif::ClassifSummary;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::StageContext;
use crate::seqio::SequenceCollection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use external::{
    ExternalBestHitAnnotator, ExternalClassifier, ExternalFeatureDetector,
    ExternalHeaderAnnotator, ExternalRedundancyRemover, ExternalTool,
};
pub use native::{JsonStatsReporter, RevCompStrandNormalizer, UniqueClassifReconciler};

#[async_trait]
pub trait FeatureDetector: Send + Sync {
    async fn run(&self, sequences: &SequenceCollection, ctx: &StageContext) -> Result<()>;
}

/// Sequential or parallel feature detection, chosen once from the run request
#[derive(Clone)]
pub enum FeatureDetection {
    Sequential(Arc<dyn FeatureDetector>),
    Parallel(Arc<dyn FeatureDetector>),
}

impl FeatureDetection {
    pub fn detector(&self) -> &Arc<dyn FeatureDetector> {
        match self {
            FeatureDetection::Sequential(d) | FeatureDetection::Parallel(d) => d,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, FeatureDetection::Parallel(_))
    }

    pub async fn run(&self, sequences: &SequenceCollection, ctx: &StageContext) -> Result<()> {
        self.detector().run(sequences, ctx).await
    }
}

/// Which part of classification a classifier invocation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStep {
    All,
    /// Register the sequence banks into the backing store
    LoadBanks,
    ClassifyOnly,
}

impl ClassifierStep {
    /// Step arguments of the classifier command line
    pub fn args(&self) -> Vec<String> {
        match self {
            ClassifierStep::All => vec![],
            ClassifierStep::LoadBanks => vec!["-S".to_string(), "1".to_string()],
            ClassifierStep::ClassifyOnly => vec!["-S".to_string(), "2".to_string()],
        }
    }

    pub fn produces_classification(&self) -> bool {
        !matches!(self, ClassifierStep::LoadBanks)
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns the classification file the step wrote (or will write, for
    /// [`ClassifierStep::LoadBanks`])
    async fn run(
        &self,
        sequences: &SequenceCollection,
        ctx: &StageContext,
        step: ClassifierStep,
    ) -> Result<PathBuf>;
}

#[async_trait]
pub trait StatsReporter: Send + Sync {
    async fn report(&self, classif: &Path) -> Result<ClassifSummary>;
}

#[async_trait]
pub trait RedundancyRemover: Send + Sync {
    async fn run(
        &self,
        sequences: &SequenceCollection,
        classif: &Path,
        output: &Path,
        ctx: &StageContext,
    ) -> Result<SequenceCollection>;
}

#[async_trait]
pub trait ClassificationReconciler: Send + Sync {
    /// Write to `output` the records of `classif` that match a sequence of `deduped`
    async fn run(&self, deduped: &SequenceCollection, classif: &Path, output: &Path)
        -> Result<PathBuf>;
}

#[async_trait]
pub trait StrandNormalizer: Send + Sync {
    async fn run(&self, input: &ArtifactPair, output: &ArtifactPair) -> Result<ArtifactPair>;
}

#[async_trait]
pub trait HeaderAnnotator: Send + Sync {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        ctx: &StageContext,
    ) -> Result<ArtifactPair>;
}

#[async_trait]
pub trait BestHitAnnotator: Send + Sync {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        ctx: &StageContext,
    ) -> Result<ArtifactPair>;
}

/// Every collaborator of one run
#[derive(Clone)]
pub struct Collaborators {
    pub feature_detection: FeatureDetection,
    pub classifier: Arc<dyn Classifier>,
    pub stats: Arc<dyn StatsReporter>,
    pub redundancy_remover: Arc<dyn RedundancyRemover>,
    pub reconciler: Arc<dyn ClassificationReconciler>,
    pub strand_normalizer: Arc<dyn StrandNormalizer>,
    pub header_annotator: Arc<dyn HeaderAnnotator>,
    pub best_hit_annotator: Arc<dyn BestHitAnnotator>,
}

impl Collaborators {
    /// Configured external tools plus the native collaborators
    pub fn from_config(config: &Config, parallel: bool) -> Self {
        let tools = &config.tools;
        let feature_detection = if parallel {
            FeatureDetection::Parallel(Arc::new(ExternalFeatureDetector::new(
                tools.detect_features_parallel.clone(),
            )))
        } else {
            FeatureDetection::Sequential(Arc::new(ExternalFeatureDetector::new(
                tools.detect_features.clone(),
            )))
        };

        Self {
            feature_detection,
            classifier: Arc::new(ExternalClassifier::new(tools.classify.clone())),
            stats: Arc::new(JsonStatsReporter),
            redundancy_remover: Arc::new(ExternalRedundancyRemover::new(
                tools.remove_redundancy.clone(),
            )),
            reconciler: Arc::new(UniqueClassifReconciler),
            strand_normalizer: Arc::new(RevCompStrandNormalizer),
            header_annotator: Arc::new(ExternalHeaderAnnotator::new(tools.rename_headers.clone())),
            best_hit_annotator: Arc::new(ExternalBestHitAnnotator::new(
                tools.nocat_best_hit.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
project:
  project_name: proj
classif_consensus:
  clean: false
  remove_redundancy: false
  rev_complement: false
  add_wicker_code: false
  add_noCat_bestHitClassif: false
"#;

    #[test]
    fn test_step_args() {
        assert!(ClassifierStep::All.args().is_empty());
        assert_eq!(ClassifierStep::LoadBanks.args(), vec!["-S", "1"]);
        assert_eq!(ClassifierStep::ClassifyOnly.args(), vec!["-S", "2"]);
        assert!(!ClassifierStep::LoadBanks.produces_classification());
    }

    #[test]
    fn test_feature_detection_variant_follows_parallel_flag() {
        let config = Config::from_yaml_str(YAML).unwrap();
        assert!(Collaborators::from_config(&config, true)
            .feature_detection
            .is_parallel());
        assert!(!Collaborators::from_config(&config, false)
            .feature_detection
            .is_parallel());
    }
}
