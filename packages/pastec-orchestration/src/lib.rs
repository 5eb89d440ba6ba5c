/*
 * PASTEC Orchestration - consensus classification pipeline
 *
 * Drives the classification of TE consensus sequences:
 * - Batch planning and parallel dispatch of classification jobs
 * - Deterministic merge of per-batch results
 * - Pipeline controller (feature detection -> classification -> post-processing)
 * - Post-processing stage chain over (sequence file, classification file) pairs
 */

// Public modules
pub mod artifact;
pub mod batch;
pub mod classif;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod job;
pub mod merge;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod seqio;
pub mod stages;

// Re-exports
pub use artifact::ArtifactPair;
pub use batch::{plan_batch_size, Batch, BatchPlanner};
pub use classif::{ClassifSummary, ClassificationRecord};
pub use collaborators::{ClassifierStep, Collaborators, FeatureDetection};
pub use config::{Config, ToolTemplate};
pub use dispatcher::JobDispatcher;
pub use error::{ErrorKind, PipelineError, Result};
pub use execution::{
    ExecutionConfig, ExecutionResource, GroupReport, JobGroup, LocalExecutionResource,
};
pub use job::{FileAction, Job, JobState, JobStateMachine};
pub use merge::{MergeReport, ResultMerger};
pub use orchestrator::{Phase, PipelineController, RunReport, RunRequest, Steps};
pub use pipeline::{ChainReport, StageChain, StageContext, StageHandler, StageId};
pub use seqio::SequenceCollection;
pub use stages::{NoCatBestHitStage, RedundancyStage, StrandStage, WickerStage};
