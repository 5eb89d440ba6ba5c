use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Prefix of dispatched job names (`PASTEC_1`, `PASTEC_2`, ...)
pub const JOB_ACRONYM: &str = "PASTEC";

/// File action performed around a job's command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileAction {
    /// Copy `from` into the job directory as `to_name`
    Copy { from: PathBuf, to_name: String },
    /// Move `from_name` out of the job directory to `to`
    Move { from_name: String, to: PathBuf },
}

/// Job state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobState {
    Submitted {
        submitted_at: DateTime<Utc>,
    },
    Running {
        started_at: DateTime<Utc>,
        work_dir: PathBuf,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_ms: u64,
    },
    Failed {
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl JobState {
    pub fn state_name(&self) -> &'static str {
        match self {
            JobState::Submitted { .. } => "submitted",
            JobState::Running { .. } => "running",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }
}

/// Dispatched unit of work for exactly one batch
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub batch_index: usize,
    pub setup: Vec<FileAction>,
    pub command: Vec<String>,
    pub teardown: Vec<FileAction>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new_submitted(
        batch_index: usize,
        setup: Vec<FileAction>,
        command: Vec<String>,
        teardown: Vec<FileAction>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: format!("{}_{}", JOB_ACRONYM, batch_index),
            batch_index,
            setup,
            command,
            teardown,
            state: JobState::Submitted { submitted_at: now },
            created_at: now,
            updated_at: now,
        }
    }
}

/// Job state machine for transitions
pub struct JobStateMachine {
    job: Job,
}

impl JobStateMachine {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn into_job(self) -> Job {
        self.job
    }

    fn invalid(&self, to: &str) -> PipelineError {
        PipelineError::InvalidStateTransition {
            from: self.job.state.state_name().to_string(),
            to: to.to_string(),
        }
    }

    /// Transition: SUBMITTED → RUNNING
    pub fn start(&mut self, work_dir: PathBuf) -> Result<()> {
        match &self.job.state {
            JobState::Submitted { .. } => {
                let now = Utc::now();
                self.job.state = JobState::Running {
                    started_at: now,
                    work_dir,
                };
                self.job.updated_at = now;
                Ok(())
            }
            _ => Err(self.invalid("running")),
        }
    }

    /// Transition: RUNNING → COMPLETED
    pub fn complete(&mut self) -> Result<()> {
        match &self.job.state {
            JobState::Running { started_at, .. } => {
                let now = Utc::now();
                let duration_ms = (now - *started_at).num_milliseconds().max(0) as u64;

                self.job.state = JobState::Completed {
                    started_at: *started_at,
                    completed_at: now,
                    duration_ms,
                };
                self.job.updated_at = now;
                Ok(())
            }
            _ => Err(self.invalid("completed")),
        }
    }

    /// Transition: SUBMITTED | RUNNING → FAILED
    ///
    /// A job can fail before it starts, e.g. when its directory cannot be created.
    pub fn fail(&mut self, error: String) -> Result<()> {
        let started_at = match &self.job.state {
            JobState::Submitted { .. } => None,
            JobState::Running { started_at, .. } => Some(*started_at),
            _ => return Err(self.invalid("failed")),
        };

        let now = Utc::now();
        self.job.state = JobState::Failed {
            started_at,
            failed_at: now,
            error,
        };
        self.job.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new_submitted(
            3,
            vec![FileAction::Copy {
                from: PathBuf::from("/w/batches/batch_3.fa"),
                to_name: "batch_3.fa".to_string(),
            }],
            vec!["true".to_string()],
            vec![],
        )
    }

    #[test]
    fn test_job_name_from_batch_index() {
        let job = job();
        assert_eq!(job.name, "PASTEC_3");
        assert_eq!(job.batch_index, 3);
        assert!(matches!(job.state, JobState::Submitted { .. }));
    }

    #[test]
    fn test_job_state_transition_submitted_to_running() {
        let mut sm = JobStateMachine::new(job());
        sm.start(PathBuf::from("/tmp/g/PASTEC_3")).unwrap();

        match &sm.job().state {
            JobState::Running { work_dir, .. } => {
                assert_eq!(work_dir, &PathBuf::from("/tmp/g/PASTEC_3"));
            }
            _ => panic!("Expected Running state"),
        }
    }

    #[test]
    fn test_job_state_transition_running_to_completed() {
        let mut sm = JobStateMachine::new(job());
        sm.start(PathBuf::from("/tmp")).unwrap();
        sm.complete().unwrap();

        assert!(sm.job().state.is_terminal());
        assert_eq!(sm.job().state.state_name(), "completed");
    }

    #[test]
    fn test_job_state_transition_running_to_failed() {
        let mut sm = JobStateMachine::new(job());
        sm.start(PathBuf::from("/tmp")).unwrap();
        sm.fail("exit status 1".to_string()).unwrap();

        match &sm.job().state {
            JobState::Failed {
                error, started_at, ..
            } => {
                assert_eq!(error, "exit status 1");
                assert!(started_at.is_some());
            }
            _ => panic!("Expected Failed state"),
        }
    }

    #[test]
    fn test_job_can_fail_before_start() {
        let mut sm = JobStateMachine::new(job());
        sm.fail("no directory".to_string()).unwrap();

        match &sm.job().state {
            JobState::Failed { started_at, .. } => assert!(started_at.is_none()),
            _ => panic!("Expected Failed state"),
        }
    }

    #[test]
    fn test_cannot_complete_submitted_job() {
        let mut sm = JobStateMachine::new(job());
        let err = sm.complete().unwrap_err();
        assert!(err.to_string().contains("submitted -> completed"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut sm = JobStateMachine::new(job());
        sm.start(PathBuf::from("/tmp")).unwrap();
        sm.complete().unwrap();

        assert!(sm.fail("too late".to_string()).is_err());
        assert!(sm.start(PathBuf::from("/tmp")).is_err());
    }
}
