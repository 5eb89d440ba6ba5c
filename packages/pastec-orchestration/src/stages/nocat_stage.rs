use crate::artifact::{ArtifactPair, NOCAT_BEST_HIT_SUFFIX};
use crate::collaborators::BestHitAnnotator;
use crate::error::Result;
use crate::pipeline::{StageContext, StageHandler, StageId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct NoCatBestHitStage {
    annotator: Arc<dyn BestHitAnnotator>,
}

impl NoCatBestHitStage {
    pub fn new(annotator: Arc<dyn BestHitAnnotator>) -> Self {
        Self { annotator }
    }
}

#[async_trait]
impl StageHandler for NoCatBestHitStage {
    fn stage_id(&self) -> StageId {
        StageId::NoCatBestHit
    }

    async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair> {
        info!("Adding noCat classification based on best hit");
        let output = pair.derive(&ctx.work_dir, NOCAT_BEST_HIT_SUFFIX);
        self.annotator.run(&pair, &output, ctx).await
    }
}
