use crate::artifact::ArtifactPair;
use crate::classif::{verify_consistency, ClassifSummary};
use crate::collaborators::{Collaborators, StatsReporter};
use crate::config::ClassifConsensusSection;
use crate::error::{PipelineError, Result};
use crate::stages::{NoCatBestHitStage, RedundancyStage, StrandStage, WickerStage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Post-processing stage identifier, in chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    RemoveRedundancy,
    ReverseComplement,
    WickerHeaders,
    NoCatBestHit,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::RemoveRedundancy => "remove_redundancy",
            StageId::ReverseComplement => "rev_complement",
            StageId::WickerHeaders => "add_wicker_code",
            StageId::NoCatBestHit => "add_noCat_bestHitClassif",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "remove_redundancy" => Ok(StageId::RemoveRedundancy),
            "rev_complement" => Ok(StageId::ReverseComplement),
            "add_wicker_code" => Ok(StageId::WickerHeaders),
            "add_noCat_bestHitClassif" => Ok(StageId::NoCatBestHit),
            _ => Err(PipelineError::Config(format!("Invalid stage ID: {}", s))),
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run parameters handed to stages and collaborators
#[derive(Debug, Clone)]
pub struct StageContext {
    pub project: String,
    pub config_path: PathBuf,
    pub decision_rules: Option<PathBuf>,
    /// Every stage output is written here
    pub work_dir: PathBuf,
    pub clean: bool,
    pub verbosity: u8,
    pub check_consistency: bool,
}

/// Post-processing stage (pluggable)
///
/// A stage reads a complete artifact pair and writes a new one whose name is
/// derived from the input name; the input pair is never modified.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage_id(&self) -> StageId;

    async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair>;
}

/// Statistics snapshot of one artifact pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
    /// `None` for the pair the chain started from
    pub after: Option<StageId>,
    pub pair: ArtifactPair,
    pub summary: ClassifSummary,
    pub duration_ms: u64,
}

/// Outcome of a chain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReport {
    pub initial: ArtifactPair,
    pub final_pair: ArtifactPair,
    pub snapshots: Vec<StageSnapshot>,
}

impl ChainReport {
    pub fn executed(&self) -> Vec<StageId> {
        self.snapshots.iter().filter_map(|s| s.after).collect()
    }

    pub fn final_summary(&self) -> Option<&ClassifSummary> {
        self.snapshots.last().map(|s| &s.summary)
    }
}

/// Ordered post-processing stages
pub struct StageChain {
    stages: Vec<Arc<dyn StageHandler>>,
    stats: Arc<dyn StatsReporter>,
}

impl StageChain {
    pub fn new(stats: Arc<dyn StatsReporter>) -> Self {
        Self {
            stages: Vec::new(),
            stats,
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn StageHandler>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Chain of the enabled stages, always in the fixed order
    pub fn from_toggles(toggles: &ClassifConsensusSection, collaborators: &Collaborators) -> Self {
        let mut chain = Self::new(collaborators.stats.clone());

        if toggles.remove_redundancy {
            chain = chain.with_stage(Arc::new(RedundancyStage::new(
                collaborators.redundancy_remover.clone(),
                collaborators.reconciler.clone(),
            )));
        }
        if toggles.rev_complement {
            chain = chain.with_stage(Arc::new(StrandStage::new(
                collaborators.strand_normalizer.clone(),
            )));
        }
        if toggles.add_wicker_code {
            chain = chain.with_stage(Arc::new(WickerStage::new(
                collaborators.header_annotator.clone(),
            )));
        }
        if toggles.add_nocat_best_hit_classif {
            chain = chain.with_stage(Arc::new(NoCatBestHitStage::new(
                collaborators.best_hit_annotator.clone(),
            )));
        }
        chain
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.stage_id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, one after the other
    pub async fn run(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ChainReport> {
        let initial = pair.clone();
        let mut snapshots = Vec::with_capacity(self.stages.len() + 1);

        if ctx.check_consistency {
            verify_consistency(&pair.sequences(), &pair.classif_path)?;
        }

        debug!("Computing statistics on initial classification {}", pair.classif_path.display());
        snapshots.push(StageSnapshot {
            after: None,
            summary: self.stats.report(&pair.classif_path).await?,
            pair: pair.clone(),
            duration_ms: 0,
        });

        let mut current = pair;
        for stage in &self.stages {
            let stage_id = stage.stage_id();
            let start = Instant::now();
            info!("Stage {}: {}", stage_id, current);

            let next = stage.execute(current.clone(), ctx).await?;

            for path in [&next.sequence_path, &next.classif_path] {
                if !path.is_file() {
                    return Err(PipelineError::MissingArtifact(format!(
                        "stage {} did not produce {}",
                        stage_id,
                        path.display()
                    )));
                }
            }
            if ctx.check_consistency {
                verify_consistency(&next.sequences(), &next.classif_path)?;
            }

            let summary = self.stats.report(&next.classif_path).await?;
            let duration_ms = start.elapsed().as_millis() as u64;
            info!("Stage {} completed in {}ms -> {}", stage_id, duration_ms, next);

            snapshots.push(StageSnapshot {
                after: Some(stage_id),
                pair: next.clone(),
                summary,
                duration_ms,
            });
            current = next;
        }

        Ok(ChainReport {
            initial,
            final_pair: current,
            snapshots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::WICKER_SUFFIX;
    use crate::collaborators::JsonStatsReporter;
    use crate::seqio::test_support::write_fasta;

    fn ctx(dir: &std::path::Path) -> StageContext {
        StageContext {
            project: "proj".to_string(),
            config_path: dir.join("proj.yml"),
            decision_rules: None,
            work_dir: dir.to_path_buf(),
            clean: false,
            verbosity: 3,
            check_consistency: true,
        }
    }

    fn seed_pair(dir: &std::path::Path) -> ArtifactPair {
        write_fasta(&dir.join("proj.fa"), &[("a", "ACGT"), ("b", "GGCC")]);
        let pair = ArtifactPair::from_base(dir, "proj");
        std::fs::write(&pair.classif_path, "a\t4\t+\tok\tI\tLTR\nb\t4\t+\tok\tII\tTIR\n").unwrap();
        pair
    }

    /// Copies the pair under the derived name
    struct CopyStage {
        id: StageId,
        drop_record: bool,
    }

    #[async_trait]
    impl StageHandler for CopyStage {
        fn stage_id(&self) -> StageId {
            self.id
        }

        async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair> {
            let next = pair.derive(&ctx.work_dir, WICKER_SUFFIX);
            std::fs::copy(&pair.sequence_path, &next.sequence_path)?;
            let classif = std::fs::read_to_string(&pair.classif_path)?;
            let classif = if self.drop_record {
                classif.lines().take(1).map(|l| format!("{}\n", l)).collect()
            } else {
                classif
            };
            std::fs::write(&next.classif_path, classif)?;
            Ok(next)
        }
    }

    #[test]
    fn test_stage_id_roundtrip() {
        for stage in &[
            StageId::RemoveRedundancy,
            StageId::ReverseComplement,
            StageId::WickerHeaders,
            StageId::NoCatBestHit,
        ] {
            assert_eq!(*stage, StageId::from_str(stage.as_str()).unwrap());
        }
        assert!(StageId::from_str("L1_IR").is_err());
    }

    #[tokio::test]
    async fn test_empty_chain_returns_input_pair() {
        let dir = tempfile::tempdir().unwrap();
        let pair = seed_pair(dir.path());

        let report = StageChain::new(Arc::new(JsonStatsReporter))
            .run(pair.clone(), &ctx(dir.path()))
            .await
            .unwrap();

        assert_eq!(report.final_pair, pair);
        assert!(report.executed().is_empty());
        assert_eq!(report.snapshots.len(), 1);
        assert!(dir.path().join("proj.classif_stats.json").exists());
    }

    #[tokio::test]
    async fn test_stage_advances_pair_and_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let pair = seed_pair(dir.path());

        let report = StageChain::new(Arc::new(JsonStatsReporter))
            .with_stage(Arc::new(CopyStage {
                id: StageId::WickerHeaders,
                drop_record: false,
            }))
            .run(pair, &ctx(dir.path()))
            .await
            .unwrap();

        assert_eq!(report.final_pair.base_name(), "proj_WickerH");
        assert!(report.final_pair.shares_base_name());
        assert_eq!(report.executed(), vec![StageId::WickerHeaders]);
        assert_eq!(report.final_summary().unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_inconsistent_stage_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pair = seed_pair(dir.path());

        let err = StageChain::new(Arc::new(JsonStatsReporter))
            .with_stage(Arc::new(CopyStage {
                id: StageId::WickerHeaders,
                drop_record: true,
            }))
            .run(pair, &ctx(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InconsistentArtifacts { .. }));
        // evidence is kept
        assert!(dir.path().join("proj_WickerH.fa").exists());
    }

    #[tokio::test]
    async fn test_inconsistent_input_pair_is_rejected_before_any_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pair = seed_pair(dir.path());
        // record for a sequence that is not in proj.fa
        std::fs::write(
            &pair.classif_path,
            "a\t4\t+\tok\tI\tLTR\nb\t4\t+\tok\tII\tTIR\nghost\t4\t+\tok\tI\tLTR\n",
        )
        .unwrap();

        let err = StageChain::new(Arc::new(JsonStatsReporter))
            .with_stage(Arc::new(CopyStage {
                id: StageId::WickerHeaders,
                drop_record: false,
            }))
            .run(pair, &ctx(dir.path()))
            .await
            .unwrap_err();

        match err {
            PipelineError::InconsistentArtifacts { reason, .. } => {
                assert!(reason.contains("ghost"));
            }
            other => panic!("Expected InconsistentArtifacts, got {:?}", other),
        }
        assert!(!dir.path().join("proj_WickerH.fa").exists());
    }

    #[tokio::test]
    async fn test_consistency_check_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let pair = seed_pair(dir.path());
        let mut context = ctx(dir.path());
        context.check_consistency = false;

        let report = StageChain::new(Arc::new(JsonStatsReporter))
            .with_stage(Arc::new(CopyStage {
                id: StageId::WickerHeaders,
                drop_record: true,
            }))
            .run(pair, &context)
            .await
            .unwrap();
        assert_eq!(report.final_summary().unwrap().total, 1);
    }
}
