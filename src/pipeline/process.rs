use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExternalStep, StepError};

/// Maximum stdout or stderr captured per stream (1 MiB)
const MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

/// Executable plus the fixed arguments that precede per-job arguments
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    pub(crate) fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Captured result of a finished child process
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stderr if the process wrote any, otherwise a description of the exit status
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status.code() {
            Some(code) => format!("process exited with status {}", code),
            None => "process terminated by signal".to_string(),
        }
    }
}

/// Spawn `cmd` without a shell, capture its output, and kill it if it runs
/// past `timeout`.
pub async fn run_command(
    mut cmd: Command,
    program: &str,
    timeout: Duration,
) -> Result<CommandOutput, StepError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| StepError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    // The deadline covers the pipe readers too: a detached grandchild can
    // keep the pipes open after the child itself has exited.
    let finished = tokio::time::timeout(timeout, async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    })
    .await;
    stdout_task.abort();
    stderr_task.abort();

    match finished {
        Ok(Ok((status, stdout, stderr))) => {
            debug!(program, ?status, "Process finished");
            Ok(CommandOutput {
                status,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            })
        }
        Ok(Err(e)) => Err(StepError::Io(e)),
        Err(_elapsed) => {
            // Dropping `child` kills the process if it is still running.
            warn!(program, timeout_secs = timeout.as_secs(), "Process timed out");
            Err(StepError::Timeout {
                step: program.to_string(),
                after: timeout,
            })
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

/// Input and output file locations for a file-to-file step
#[derive(Debug, Clone)]
pub struct FileTransform {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Runs `<program> <args..> <input> <output>`.
///
/// Succeeds only if the process exits with status zero and the output file
/// exists afterwards.
pub struct ProcessStep {
    name: String,
    spec: CommandSpec,
    timeout: Duration,
}

impl ProcessStep {
    pub fn new(name: impl Into<String>, spec: CommandSpec, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            spec,
            timeout,
        }
    }
}

#[async_trait]
impl ExternalStep for ProcessStep {
    type Input = FileTransform;
    type Output = PathBuf;

    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, files: &FileTransform) -> Result<PathBuf, StepError> {
        let mut cmd = self.spec.command();
        cmd.arg(&files.input).arg(&files.output);

        let output = run_command(cmd, &self.spec.display_name(), self.timeout).await?;
        if !output.status.success() {
            return Err(StepError::Failed(output.failure_detail()));
        }
        if !output_exists(&files.output).await {
            return Err(StepError::Failed(format!(
                "process exited successfully but did not write {}",
                files.output.display()
            )));
        }
        Ok(files.output.clone())
    }
}

pub(crate) async fn output_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
