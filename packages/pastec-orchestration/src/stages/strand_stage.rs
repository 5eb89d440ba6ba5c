use crate::artifact::{ArtifactPair, NEG_STRAND_REVERSED_SUFFIX};
use crate::collaborators::StrandNormalizer;
use crate::error::Result;
use crate::pipeline::{StageContext, StageHandler, StageId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Reverse-complement normalization (`<base>_negStrandReversed`)
pub struct StrandStage {
    normalizer: Arc<dyn StrandNormalizer>,
}

impl StrandStage {
    pub fn new(normalizer: Arc<dyn StrandNormalizer>) -> Self {
        Self { normalizer }
    }
}

#[async_trait]
impl StageHandler for StrandStage {
    fn stage_id(&self) -> StageId {
        StageId::ReverseComplement
    }

    async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair> {
        info!("Reverse complement");
        let output = pair.derive(&ctx.work_dir, NEG_STRAND_REVERSED_SUFFIX);
        self.normalizer.run(&pair, &output).await
    }
}
