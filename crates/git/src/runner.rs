//! Subprocess execution behind a narrow trait.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::GitError;

/// Maximum stdout or stderr size captured per stream (64 MiB).
///
/// Ranged listings over large repositories can be big, but unbounded
/// capture would let a misbehaving command exhaust memory.
const MAX_OUTPUT_BYTES: usize = 64 * 1024 * 1024;

/// Captured result of one command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Arguments in, raw output and status out.
///
/// Implemented by [`ProcessRunner`] in production and by scripted fakes
/// in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GitError>;
}

/// Runs real child processes via [`tokio::process::Command`].
#[derive(Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, GitError> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| GitError::Spawn {
            program: program.to_string(),
            source,
        })?;

        // Read stdout/stderr in spawned tasks so `child.wait()` can run
        // concurrently without deadlocking on full pipes.
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        let status = child.wait().await.map_err(|source| GitError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            exit_code: status.code(),
        })
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

/// Run `program` and return stdout, mapping a non-zero exit to an error.
pub async fn run_ok(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> Result<String, GitError> {
    let out = runner.run(program, args).await?;
    if !out.success() {
        return Err(GitError::CommandFailed {
            program: program.to_string(),
            exit_code: out.exit_code,
            stderr: out.stderr,
        });
    }
    Ok(out.stdout)
}
