//! # External Process Invocation
//!
//! Il driver batch non lancia mai i processi direttamente: passa sempre da
//! un `ProcessInvoker`, così i test possono sostituire gli analyzer reali.
//!
//! ## Comportamento di `SubprocessInvoker`:
//! - stdout e stderr catturati per intero
//! - limite di tempo per invocazione; allo scadere il figlio viene terminato
//! - un programma che non parte produce `AnalyzeError::Spawn`

use crate::error::AnalyzeError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    async fn invoke(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, AnalyzeError>;
}

/// Real subprocesses through `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessInvoker;

#[async_trait]
impl ProcessInvoker for SubprocessInvoker {
    async fn invoke(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, AnalyzeError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| AnalyzeError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let start_time = Instant::now();
        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AnalyzeError::TimeoutExceeded {
                target: program.to_string(),
                limit: timeout,
            })??;

        debug!(
            "{} exited with {:?} after {:.1}s",
            program,
            output.status.code(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::args;

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let output = SubprocessInvoker
            .invoke(
                "sh",
                &args!["-c", "echo out; echo err >&2; exit 3"],
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_successful_exit() {
        let output = SubprocessInvoker
            .invoke("sh", &args!["-c", "exit 0"], Duration::from_secs(10))
            .await
            .unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = SubprocessInvoker
            .invoke("sh", &args!["-c", "sleep 30"], Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzeError::TimeoutExceeded { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = SubprocessInvoker
            .invoke("definitely-not-a-real-program-42", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Spawn { .. }));
    }
}
