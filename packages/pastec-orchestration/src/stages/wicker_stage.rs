use crate::artifact::{ArtifactPair, WICKER_SUFFIX};
use crate::collaborators::HeaderAnnotator;
use crate::error::Result;
use crate::pipeline::{StageContext, StageHandler, StageId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Header renaming with Wicker's code (`<base>_WickerH`)
pub struct WickerStage {
    annotator: Arc<dyn HeaderAnnotator>,
}

impl WickerStage {
    pub fn new(annotator: Arc<dyn HeaderAnnotator>) -> Self {
        Self { annotator }
    }
}

#[async_trait]
impl StageHandler for WickerStage {
    fn stage_id(&self) -> StageId {
        StageId::WickerHeaders
    }

    async fn execute(&self, pair: ArtifactPair, ctx: &StageContext) -> Result<ArtifactPair> {
        info!("Rename headers according to Wicker's code");
        let output = pair.derive(&ctx.work_dir, WICKER_SUFFIX);
        self.annotator.run(&pair, &output, ctx).await
    }
}
