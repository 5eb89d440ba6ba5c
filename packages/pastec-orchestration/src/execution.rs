//! Execution resources for dispatched job groups
//!
//! The resource settings are carried by an explicit [`ExecutionConfig`] built once
//! from the run configuration; nothing is read from or written to the process
//! environment.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::job::{FileAction, Job, JobState, JobStateMachine};
use crate::process::run_command;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub const LOCAL_BACKEND: &str = "local";

/// Settings of the execution resource used by the job dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub group_id: String,
    /// Queue or resource identifier handed to the backend
    pub resources: String,
    /// Root of the per-job directories
    pub tmp_dir: PathBuf,
    /// Directory the pipeline runs in (batches, merged results)
    pub work_dir: PathBuf,
    pub max_concurrent: usize,
    pub clean: bool,
}

impl ExecutionConfig {
    pub fn from_config(config: &Config, work_dir: &Path, clean: bool) -> Self {
        let section = &config.classif_consensus;
        let tmp_dir = match section.tmp_dir.as_deref() {
            None | Some("") => work_dir.to_path_buf(),
            Some(dir) => work_dir.join(dir),
        };

        Self {
            group_id: format!("{}_PASTEC", config.project_name()),
            resources: section.resources.clone().unwrap_or_default(),
            tmp_dir,
            work_dir: work_dir.to_path_buf(),
            max_concurrent: config
                .execution
                .max_concurrent_jobs
                .unwrap_or_else(num_cpus::get)
                .max(1),
            clean,
        }
    }
}

/// Jobs submitted together and awaited together
#[derive(Debug, Clone)]
pub struct JobGroup {
    pub group_id: String,
    pub jobs: Vec<Job>,
}

/// Terminal state of every job of a group
#[derive(Debug, Clone)]
pub struct GroupReport {
    pub group_id: String,
    pub jobs: Vec<Job>,
}

impl GroupReport {
    pub fn failed(&self) -> impl Iterator<Item = &Job> {
        self.jobs
            .iter()
            .filter(|job| matches!(job.state, JobState::Failed { .. }))
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failed().map(|job| job.name.clone()).collect()
    }

    pub fn all_completed(&self) -> bool {
        self.jobs
            .iter()
            .all(|job| matches!(job.state, JobState::Completed { .. }))
    }
}

/// Backend that runs job groups
///
/// `submit_group` blocks until every job is terminal. Individual job failures are
/// reported in the [`GroupReport`], not as an error; an error means the group
/// itself could not be run.
#[async_trait]
pub trait ExecutionResource: Send + Sync {
    async fn submit_group(&self, group: JobGroup) -> Result<GroupReport>;
}

/// Build the resource named by `execution.backend`
pub fn resource_from_config(
    config: &Config,
    exec: ExecutionConfig,
) -> Result<Arc<dyn ExecutionResource>> {
    match config.execution.backend.as_str() {
        LOCAL_BACKEND => Ok(Arc::new(LocalExecutionResource::new(exec))),
        other => Err(PipelineError::Config(format!(
            "Unsupported execution backend '{}'",
            other
        ))),
    }
}

/// Runs jobs as local processes, each in `<tmp_dir>/<group_id>/<job_name>`
pub struct LocalExecutionResource {
    config: ExecutionConfig,
    history: Arc<Mutex<Vec<Job>>>,
}

impl LocalExecutionResource {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Jobs that reached a terminal state, in completion order
    pub fn history(&self) -> Vec<Job> {
        self.history.lock().clone()
    }

    fn group_dir(&self, group_id: &str) -> PathBuf {
        self.config.tmp_dir.join(group_id)
    }
}

#[async_trait]
impl ExecutionResource for LocalExecutionResource {
    async fn submit_group(&self, group: JobGroup) -> Result<GroupReport> {
        let group_dir = self.group_dir(&group.group_id);
        tokio::fs::create_dir_all(&group_dir).await?;

        info!(
            "Group {}: submitting {} jobs (resources: '{}', {} at a time)",
            group.group_id,
            group.jobs.len(),
            self.config.resources,
            self.config.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let submitted = group.jobs.clone();

        let mut tasks = Vec::with_capacity(group.jobs.len());
        for job in group.jobs {
            let semaphore = semaphore.clone();
            let history = self.history.clone();
            let job_dir = group_dir.join(&job.name);
            let clean = self.config.clean;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Other(e.into()))?;
                let job = run_job(job, job_dir, clean).await;
                history.lock().push(job.clone());
                Ok::<Job, PipelineError>(job)
            }));
        }

        let results = futures::future::join_all(tasks).await;

        let mut jobs = Vec::with_capacity(results.len());
        for (result, original) in results.into_iter().zip(submitted) {
            match result {
                Ok(Ok(job)) => jobs.push(job),
                Ok(Err(e)) => jobs.push(failed_copy(original, e.to_string())),
                Err(join_err) => {
                    error!("Job {} panicked: {}", original.name, join_err);
                    jobs.push(failed_copy(original, format!("panicked: {}", join_err)));
                }
            }
        }

        if self.config.clean {
            if let Err(e) = tokio::fs::remove_dir_all(&group_dir).await {
                debug!("Could not remove {}: {}", group_dir.display(), e);
            }
        }

        let report = GroupReport {
            group_id: group.group_id,
            jobs,
        };
        info!(
            "Group {}: {} jobs finished, {} failed",
            report.group_id,
            report.jobs.len(),
            report.failed().count()
        );
        Ok(report)
    }
}

fn failed_copy(job: Job, error: String) -> Job {
    let mut sm = JobStateMachine::new(job);
    if let Err(e) = sm.fail(error) {
        warn!("Could not mark job as failed: {}", e);
    }
    sm.into_job()
}

async fn run_job(job: Job, job_dir: PathBuf, clean: bool) -> Job {
    let mut sm = JobStateMachine::new(job);

    let outcome = match sm.start(job_dir.clone()) {
        Ok(()) => execute_job(sm.job(), &job_dir).await,
        Err(e) => Err(e),
    };

    let transition = match outcome {
        Ok(()) => {
            info!("Job {} completed", sm.job().name);
            sm.complete()
        }
        Err(e) => {
            warn!("Job {} failed: {}", sm.job().name, e);
            sm.fail(e.to_string())
        }
    };
    if let Err(e) = transition {
        error!("Job {}: {}", sm.job().name, e);
    }

    if clean {
        if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
            debug!("Could not remove {}: {}", job_dir.display(), e);
        }
    }

    sm.into_job()
}

async fn execute_job(job: &Job, job_dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(job_dir).await? {
        tokio::fs::remove_dir_all(job_dir).await?;
    }
    tokio::fs::create_dir_all(job_dir).await?;

    for action in &job.setup {
        perform(action, job_dir).await?;
    }

    let stdout = run_command(&job.command, job_dir).await?;
    if !stdout.is_empty() {
        debug!("Job {} output:\n{}", job.name, stdout.trim_end());
    }

    for action in &job.teardown {
        perform(action, job_dir).await?;
    }
    Ok(())
}

async fn perform(action: &FileAction, job_dir: &Path) -> Result<()> {
    match action {
        FileAction::Copy { from, to_name } => {
            tokio::fs::copy(from, job_dir.join(to_name))
                .await
                .map_err(|e| {
                    PipelineError::MissingArtifact(format!("{} ({})", from.display(), e))
                })?;
        }
        FileAction::Move { from_name, to } => {
            let from = job_dir.join(from_name);
            if !tokio::fs::try_exists(&from).await? {
                return Err(PipelineError::missing_artifact(&from));
            }
            move_file(&from, to).await?;
        }
    }
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
