use crate::error::{PipelineError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run `argv` in `cwd` and return its stdout
///
/// A non-zero exit status becomes [`PipelineError::ToolFailed`] carrying stderr.
pub async fn run_command(argv: &[String], cwd: &Path) -> Result<String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| PipelineError::Config("Empty command".to_string()))?;

    debug!("Running '{}' in {}", argv.join(" "), cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PipelineError::ToolFailed {
            tool: program.clone(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(PipelineError::ToolFailed {
            tool: program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command(&argv(&["sh", "-c", "echo hello"]), dir.path())
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_uses_cwd() {
        let dir = tempfile::tempdir().unwrap();
        run_command(&argv(&["sh", "-c", "touch marker"]), dir.path())
            .await
            .unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_tool_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(&argv(&["sh", "-c", "echo boom >&2; exit 3"]), dir.path())
            .await
            .unwrap_err();

        match err {
            PipelineError::ToolFailed { tool, stderr, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "boom");
            }
            other => panic!("Expected ToolFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_program_is_tool_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(&argv(&["definitely-not-a-real-tool-xyz"]), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_command(&[], dir.path()).await.is_err());
    }
}
