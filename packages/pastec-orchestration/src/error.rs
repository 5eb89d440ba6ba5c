use pastec_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid sequence headers in {}: {}", file.display(), headers.join(", "))]
    Validation { file: PathBuf, headers: Vec<String> },

    #[error("Batch planning failed: {0}")]
    Planning(String),

    #[error("Job group {group_id}: {} job(s) failed: {}", failed.len(), failed.join(", "))]
    JobExecution {
        group_id: String,
        failed: Vec<String>,
    },

    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Inconsistent artifacts {}: {reason}", sequence_path.display())]
    InconsistentArtifacts {
        sequence_path: PathBuf,
        classif_path: PathBuf,
        reason: String,
    },

    #[error("Tool {tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    pub fn missing_artifact(path: &std::path::Path) -> Self {
        Self::MissingArtifact(path.display().to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Validation { .. } | PipelineError::InconsistentArtifacts { .. } => {
                ErrorKind::Validation
            }
            PipelineError::Planning(_) => ErrorKind::Planning,
            PipelineError::JobExecution { .. } => ErrorKind::JobExecution,
            PipelineError::MissingArtifact(_) => ErrorKind::MissingArtifact,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
            PipelineError::ToolFailed { .. } => ErrorKind::Tool,
            PipelineError::InvalidStateTransition { .. }
            | PipelineError::Serialization(_)
            | PipelineError::Other(_) => ErrorKind::Internal,
            PipelineError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

/// Error kind reported to the caller; every kind aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Validation,
    Planning,
    JobExecution,
    MissingArtifact,
    Persistence,
    Tool,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::Planning => "planning",
            ErrorKind::JobExecution => "job_execution",
            ErrorKind::MissingArtifact => "missing_artifact",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Tool => "tool",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_execution_error_lists_failed_jobs() {
        let err = PipelineError::JobExecution {
            group_id: "proj_PASTEC".to_string(),
            failed: vec!["PASTEC_2".to_string(), "PASTEC_5".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("proj_PASTEC"));
        assert!(msg.contains("2 job(s) failed"));
        assert!(msg.contains("PASTEC_2, PASTEC_5"));
        assert_eq!(err.kind(), ErrorKind::JobExecution);
    }

    #[test]
    fn test_validation_error_lists_headers() {
        let err = PipelineError::Validation {
            file: PathBuf::from("consensus.fa"),
            headers: vec!["bad|name".to_string(), "with space".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("consensus.fa"));
        assert!(msg.contains("bad|name"));
        assert!(msg.contains("with space"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_persistence_from_storage_error() {
        let err: PipelineError = StorageError::database("disk full").into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::Config.as_str(), "config");
        assert_eq!(ErrorKind::MissingArtifact.as_str(), "missing_artifact");
        assert_eq!(ErrorKind::JobExecution.to_string(), "job_execution");
    }
}
