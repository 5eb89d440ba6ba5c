use crate::artifact;
use crate::batch::{Batch, BATCHES_DIR};
use crate::collaborators::external::base_vars;
use crate::collaborators::ClassifierStep;
use crate::config::ToolTemplate;
use crate::error::{PipelineError, Result};
use crate::execution::{ExecutionConfig, ExecutionResource, JobGroup};
use crate::job::{FileAction, Job};
use crate::merge::ResultMerger;
use crate::pipeline::StageContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Wraps batches into classification jobs, runs them as one group and merges
/// their results
pub struct JobDispatcher {
    exec: ExecutionConfig,
    resource: Arc<dyn ExecutionResource>,
    classify: ToolTemplate,
}

impl JobDispatcher {
    pub fn new(
        exec: ExecutionConfig,
        resource: Arc<dyn ExecutionResource>,
        classify: ToolTemplate,
    ) -> Self {
        Self {
            exec,
            resource,
            classify,
        }
    }

    /// Prefix of the per-batch results moved back into the working directory
    pub fn part_prefix(project: &str) -> String {
        format!("{}.{}_", project, artifact::CLASSIF_EXT)
    }

    /// One job per batch: stage the batch and the configuration, classify the
    /// batch only, move `<project>.classif` back as `<project>.classif_<n>`
    pub fn build_jobs(&self, batches: &[Batch], ctx: &StageContext) -> Result<Vec<Job>> {
        let config_name = ctx
            .config_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "Invalid configuration path {}",
                    ctx.config_path.display()
                ))
            })?;
        let classif_name = format!("{}.{}", ctx.project, artifact::CLASSIF_EXT);
        let prefix = Self::part_prefix(&ctx.project);

        let mut jobs = Vec::with_capacity(batches.len());
        for batch in batches {
            let mut vars = base_vars(ctx);
            vars.insert("config", vec![config_name.clone()]);
            vars.insert("input", vec![batch.file_name()]);
            vars.insert("step", ClassifierStep::ClassifyOnly.args());
            let command = self.classify.render(&vars)?;

            let setup = vec![
                FileAction::Copy {
                    from: batch.path.clone(),
                    to_name: batch.file_name(),
                },
                FileAction::Copy {
                    from: ctx.config_path.clone(),
                    to_name: config_name.clone(),
                },
            ];
            let teardown = vec![FileAction::Move {
                from_name: classif_name.clone(),
                to: self.exec.work_dir.join(format!("{}{}", prefix, batch.index)),
            }];

            jobs.push(Job::new_submitted(batch.index, setup, command, teardown));
        }
        Ok(jobs)
    }

    /// Run every batch and return the merged classification file.
    ///
    /// Any failed job fails the whole call with the failing job names; outputs of
    /// the jobs that succeeded are left in place.
    pub async fn dispatch(&self, batches: &[Batch], ctx: &StageContext) -> Result<PathBuf> {
        if batches.is_empty() {
            return Err(PipelineError::Planning("no batches to dispatch".to_string()));
        }

        let prefix = Self::part_prefix(&ctx.project);
        let merger = ResultMerger::new(&self.exec.work_dir)
            .with_batches_dir(self.exec.work_dir.join(BATCHES_DIR));
        // parts left by an earlier run would otherwise be merged with this one's
        merger.discard(&prefix)?;

        let jobs = self.build_jobs(batches, ctx)?;
        info!(
            "Launching {} classification jobs in group {}",
            jobs.len(),
            self.exec.group_id
        );

        let report = self
            .resource
            .submit_group(JobGroup {
                group_id: self.exec.group_id.clone(),
                jobs,
            })
            .await?;

        let failed = report.failed_names();
        if !failed.is_empty() {
            error!(
                "Group {}: {} of {} jobs failed",
                report.group_id,
                failed.len(),
                report.jobs.len()
            );
            return Err(PipelineError::JobExecution {
                group_id: report.group_id,
                failed,
            });
        }

        let destination = artifact::merged_classif(&self.exec.work_dir, &ctx.project);
        merger.merge(&prefix, &destination, self.exec.clean)?;

        Ok(destination)
    }
}
