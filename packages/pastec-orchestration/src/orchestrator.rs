use crate::artifact::{self, ArtifactPair};
use crate::batch::{plan_batch_size, Batch, BatchPlanner};
use crate::collaborators::{ClassifierStep, Collaborators};
use crate::config::Config;
use crate::dispatcher::JobDispatcher;
use crate::error::{PipelineError, Result};
use crate::execution::{resource_from_config, ExecutionConfig, ExecutionResource};
use crate::pipeline::{ChainReport, StageChain, StageContext};
use crate::seqio::SequenceCollection;
use pastec_storage::{PersistentStore, TableKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Top-level phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    NotStarted,
    FeatureDetection,
    Classification,
    PostProcessing,
    Done,
}

/// Which phases a run performs
///
/// `"1"` runs feature detection, `"2"` runs classification and post-processing,
/// `"0"` (or an empty selector) runs everything. Digits can be combined (`"12"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    pub detect: bool,
    pub classify: bool,
}

impl Steps {
    pub const ALL: Steps = Steps {
        detect: true,
        classify: true,
    };

    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(Self::ALL);
        }
        if !selector.chars().all(|c| matches!(c, '0' | '1' | '2')) {
            return Err(PipelineError::Config(format!(
                "Invalid step selector '{}': expected 0, 1 or 2",
                selector
            )));
        }

        let all = selector.contains('0');
        Ok(Self {
            detect: all || selector.contains('1'),
            classify: all || selector.contains('2'),
        })
    }
}

impl Default for Steps {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::str::FromStr for Steps {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub fasta: PathBuf,
    pub decision_rules: Option<PathBuf>,
    pub steps: Steps,
    pub parallel: bool,
    /// Combined with `classif_consensus.clean`; either enables cleanup
    pub clean: bool,
    pub verbosity: u8,
}

impl RunRequest {
    pub fn new(fasta: impl Into<PathBuf>) -> Self {
        Self {
            fasta: fasta.into(),
            decision_rules: None,
            steps: Steps::ALL,
            parallel: false,
            clean: false,
            verbosity: 3,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sequence_count: usize,
    pub phases: Vec<Phase>,
    pub batches: Vec<Batch>,
    pub chain: Option<ChainReport>,
    pub table: Option<String>,
    pub rows_stored: usize,
    pub alias: Option<PathBuf>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn final_pair(&self) -> Option<&ArtifactPair> {
        self.chain.as_ref().map(|c| &c.final_pair)
    }
}

/// Sequences detection, classification and post-processing for one working directory
///
/// Phases run strictly one after the other; any error aborts the run and leaves
/// every artifact produced so far on disk.
pub struct PipelineController {
    config: Arc<Config>,
    work_dir: PathBuf,
    collaborators: Collaborators,
    store: Arc<dyn PersistentStore>,
    resource: Option<Arc<dyn ExecutionResource>>,
}

impl PipelineController {
    pub fn new(
        config: Arc<Config>,
        work_dir: impl Into<PathBuf>,
        collaborators: Collaborators,
        store: Arc<dyn PersistentStore>,
    ) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            collaborators,
            store,
            resource: None,
        }
    }

    /// Execution resource for parallel classification; defaults to the one named
    /// by `execution.backend`
    pub fn with_execution_resource(mut self, resource: Arc<dyn ExecutionResource>) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let start = Instant::now();
        let tool_name = if request.parallel {
            "PASTEClassifier parallelized"
        } else {
            "PASTEClassifier"
        };

        let (sequences, ctx) = self.prepare(&request)?;

        info!("START {}", tool_name);
        info!("Fasta file name: {}", sequences.path().display());
        let sequence_count = sequences.count()?;
        debug!("Total number of sequences: {}", sequence_count);

        let mut report = RunReport {
            sequence_count,
            ..Default::default()
        };
        let mut phase = Phase::NotStarted;

        if request.steps.detect {
            enter(&mut phase, Phase::FeatureDetection, &mut report);
            info!("Running STEP 1 of {}: DetectTEFeatures", tool_name);
            self.collaborators
                .feature_detection
                .run(&sequences, &ctx)
                .await?;
            info!("Finished STEP 1 of {}: DetectTEFeatures", tool_name);
        }

        if request.steps.classify {
            enter(&mut phase, Phase::Classification, &mut report);
            info!("Running STEP 2 of {}: Classification", tool_name);
            let classif = if request.parallel {
                let (classif, batches) = self
                    .classify_in_parallel(&sequences, sequence_count, &ctx)
                    .await?;
                report.batches = batches;
                classif
            } else {
                self.collaborators
                    .classifier
                    .run(&sequences, &ctx, ClassifierStep::All)
                    .await?
            };

            enter(&mut phase, Phase::PostProcessing, &mut report);
            self.post_process(&sequences, classif, &ctx, &mut report)
                .await?;
            info!("Finished STEP 2 of {}: Classification", tool_name);
        }

        enter(&mut phase, Phase::Done, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!("END {} ({}ms)", tool_name, report.duration_ms);
        Ok(report)
    }

    /// Checks that must pass before any phase runs
    fn prepare(&self, request: &RunRequest) -> Result<(SequenceCollection, StageContext)> {
        if request.parallel {
            self.config.validate_parallel()?;
        }

        if !request.fasta.is_file() {
            return Err(PipelineError::Config(format!(
                "Missing input fasta file name: {}",
                request.fasta.display()
            )));
        }
        let sequences = SequenceCollection::new(request.fasta.canonicalize()?);
        sequences.validate_headers()?;

        let decision_rules = match &request.decision_rules {
            Some(rules) if rules.is_file() => Some(rules.canonicalize()?),
            Some(rules) => {
                return Err(PipelineError::Config(format!(
                    "Decision rules file not found: {}",
                    rules.display()
                )))
            }
            None => None,
        };

        let config_path = if self.config.source_path.is_file() {
            self.config.source_path.canonicalize()?
        } else {
            self.config.source_path.clone()
        };

        std::fs::create_dir_all(&self.work_dir)?;

        let ctx = StageContext {
            project: self.config.project_name().to_string(),
            config_path,
            decision_rules,
            work_dir: self.work_dir.clone(),
            clean: request.clean || self.config.classif_consensus.clean,
            verbosity: request.verbosity,
            check_consistency: self.config.classif_consensus.check_consistency,
        };
        Ok((sequences, ctx))
    }

    async fn classify_in_parallel(
        &self,
        sequences: &SequenceCollection,
        sequence_count: usize,
        ctx: &StageContext,
    ) -> Result<(PathBuf, Vec<Batch>)> {
        debug!("Insert banks in database");
        self.collaborators
            .classifier
            .run(sequences, ctx, ClassifierStep::LoadBanks)
            .await?;

        info!("Split fasta file");
        let section = &self.config.classif_consensus;
        let batch_size = plan_batch_size(
            sequence_count,
            section.limit_job_nb.unwrap_or(0),
            section.min_batch_size,
        );
        let batches = BatchPlanner::new(&self.work_dir).split(sequences, batch_size)?;

        info!("Launch classification on each batch");
        let exec = ExecutionConfig::from_config(&self.config, &self.work_dir, ctx.clean);
        let resource = match &self.resource {
            Some(resource) => resource.clone(),
            None => resource_from_config(&self.config, exec.clone())?,
        };
        let dispatcher = JobDispatcher::new(exec, resource, self.config.tools.classify.clone());
        let classif = dispatcher.dispatch(&batches, ctx).await?;

        Ok((classif, batches))
    }

    async fn post_process(
        &self,
        sequences: &SequenceCollection,
        classif: PathBuf,
        ctx: &StageContext,
        report: &mut RunReport,
    ) -> Result<()> {
        info!("Started post processing of classification");
        if !classif.is_file() {
            error!("No classification file found or generated");
            return Err(PipelineError::MissingArtifact(format!(
                "No classification file found or generated ({})",
                classif.display()
            )));
        }

        let chain = StageChain::from_toggles(&self.config.classif_consensus, &self.collaborators);
        let chain_report = chain
            .run(ArtifactPair::for_sequences(sequences.path(), classif), ctx)
            .await?;
        let final_pair = chain_report.final_pair.clone();
        report.chain = Some(chain_report);

        let table = artifact::consensus_table(&ctx.project);
        report.rows_stored = self
            .store
            .create_table(&table, TableKind::Classif, &final_pair.classif_path, true)
            .await?;
        report.table = Some(table);

        let alias = artifact::library_alias(&self.work_dir, &ctx.project);
        publish_alias(&final_pair.sequence_path, &alias)?;
        info!("Published {} -> {}", alias.display(), final_pair.sequence_path.display());
        report.alias = Some(alias);

        info!("Finished post processing of classification");
        Ok(())
    }
}

fn enter(phase: &mut Phase, next: Phase, report: &mut RunReport) {
    debug!("Phase {:?} -> {:?}", phase, next);
    *phase = next;
    report.phases.push(next);
}

/// Point `alias` at `target`, replacing a previous alias
///
/// The link is relative when both live in the same directory. Nothing happens
/// when `alias` already resolves to `target`, and a regular file in the way of
/// the alias is never removed.
pub fn publish_alias(target: &Path, alias: &Path) -> Result<()> {
    if let Ok(meta) = alias.symlink_metadata() {
        if let (Ok(a), Ok(t)) = (alias.canonicalize(), target.canonicalize()) {
            if a == t {
                debug!("{} already resolves to {}", alias.display(), target.display());
                return Ok(());
            }
        }
        if !meta.file_type().is_symlink() && cfg!(unix) {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "{} exists and is not a link, refusing to replace it",
                    alias.display()
                ),
            )));
        }
        std::fs::remove_file(alias)?;
    }

    let link_target = match (target.parent(), alias.parent(), target.file_name()) {
        (Some(t), Some(a), Some(name)) if same_dir(t, a) => PathBuf::from(name),
        _ => target.to_path_buf(),
    };

    #[cfg(unix)]
    std::os::unix::fs::symlink(&link_target, alias)?;
    #[cfg(not(unix))]
    {
        let _ = link_target;
        std::fs::copy(target, alias)?;
    }
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_selector() {
        assert_eq!(Steps::parse("0").unwrap(), Steps::ALL);
        assert_eq!(Steps::parse("").unwrap(), Steps::ALL);
        assert_eq!(Steps::parse("12").unwrap(), Steps::ALL);
        assert_eq!(
            Steps::parse("1").unwrap(),
            Steps {
                detect: true,
                classify: false
            }
        );
        assert_eq!(
            Steps::parse("2").unwrap(),
            Steps {
                detect: false,
                classify: true
            }
        );
        assert!(Steps::parse("3").is_err());
        assert!(Steps::parse("all").is_err());
        assert_eq!("2".parse::<Steps>().unwrap(), Steps::parse("2").unwrap());
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::NotStarted < Phase::FeatureDetection);
        assert!(Phase::Classification < Phase::PostProcessing);
        assert!(Phase::PostProcessing < Phase::Done);
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_alias_replaces_previous_link() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("proj_WickerH.fa");
        let second = dir.path().join("proj_noCatBestHit.fa");
        std::fs::write(&first, ">a\nA\n").unwrap();
        std::fs::write(&second, ">b\nC\n").unwrap();
        let alias = dir.path().join("proj_denovoLibTEs.fa");

        publish_alias(&first, &alias).unwrap();
        publish_alias(&second, &alias).unwrap();

        assert_eq!(
            std::fs::read_link(&alias).unwrap(),
            PathBuf::from("proj_noCatBestHit.fa")
        );
        assert_eq!(std::fs::read_to_string(&alias).unwrap(), ">b\nC\n");
    }

    #[test]
    fn test_publish_alias_onto_its_own_target_keeps_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("proj_denovoLibTEs.fa");
        std::fs::write(&target, ">a\nACGT\n").unwrap();

        publish_alias(&target, &target).unwrap();

        assert!(!target.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), ">a\nACGT\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_alias_refuses_to_replace_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("proj_WickerH.fa");
        std::fs::write(&target, ">a\nA\n").unwrap();
        let alias = dir.path().join("proj_denovoLibTEs.fa");
        std::fs::write(&alias, ">user\nC\n").unwrap();

        let err = publish_alias(&target, &alias).unwrap_err();

        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(std::fs::read_to_string(&alias).unwrap(), ">user\nC\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_alias_absolute_across_directories() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        let target = input_dir.join("consensus.fa");
        std::fs::write(&target, ">a\nA\n").unwrap();
        let alias = dir.path().join("proj_denovoLibTEs.fa");

        publish_alias(&target, &alias).unwrap();
        assert_eq!(std::fs::read_link(&alias).unwrap(), target);
    }
}
