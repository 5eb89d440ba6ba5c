use crate::artifact::{self, ArtifactPair};
use crate::collaborators::{ClassificationReconciler, RedundancyRemover};
use crate::error::Result;
use crate::pipeline::{StageContext, StageHandler, StageId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Redundancy removal, then reconciliation of the classification with the
/// surviving sequences. Output: `<project>_withoutRedundancy.{fa,classif}`.
pub struct RedundancyStage {
    remover: Arc<dyn RedundancyRemover>,
    reconciler: Arc<dyn ClassificationReconciler>,
}

impl RedundancyStage {
    pub fn new(
        remover: Arc<dyn RedundancyRemover>,
        reconciler: Arc<dyn ClassificationReconciler>,
    ) -> Self {
        Self {
            remover,
            reconciler,
        }
    }
}

#[async_trait]
impl StageHandler for RedundancyStage {
    fn stage_id(&self) -> StageId {
        StageId::RemoveRedundancy
    }

    async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair> {
        info!("Removing redundancy");
        // both output names come from the same helper
        let output = artifact::without_redundancy(&ctx.work_dir, &ctx.project);

        let deduped = self
            .remover
            .run(
                &pair.sequences(),
                &pair.classif_path,
                &output.sequence_path,
                ctx,
            )
            .await?;

        self.reconciler
            .run(&deduped, &pair.classif_path, &output.classif_path)
            .await?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::UniqueClassifReconciler;
    use crate::seqio::{self, test_support::write_fasta, SequenceCollection};
    use std::path::Path;

    /// Keeps only sequences whose name does not start with "dup"
    struct DropDuplicates;

    #[async_trait]
    impl RedundancyRemover for DropDuplicates {
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

    #[tokio::test]
    async fn test_output_named_after_project() {
        let dir = tempfile::tempdir().unwrap();
        let input_fa = write_fasta(
            &dir.path().join("consensus.fa"),
            &[("a", "ACGT"), ("dup1", "ACGT"), ("b", "TTTT")],
        );
        let classif = dir.path().join("proj.classif");
        std::fs::write(&classif, "a\t4\t+\ndup1\t4\t+\nb\t4\t-\n").unwrap();

        let ctx = StageContext {
            project: "proj".to_string(),
            config_path: dir.path().join("proj.yml"),
            decision_rules: None,
            work_dir: dir.path().to_path_buf(),
            clean: false,
            verbosity: 3,
            check_consistency: true,
        };

        let stage = RedundancyStage::new(Arc::new(DropDuplicates), Arc::new(UniqueClassifReconciler));
        let out = stage
            .execute(ArtifactPair::for_sequences(input_fa, classif), &ctx)
            .await
            .unwrap();

        assert_eq!(out.base_name(), "proj_withoutRedundancy");
        assert!(out.shares_base_name());
        assert_eq!(
            std::fs::read_to_string(&out.classif_path).unwrap(),
            "a\t4\t+\nb\t4\t-\n"
        );
    }
}
