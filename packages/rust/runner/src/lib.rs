//! Subprocess invocation for external build tools.
//!
//! A [`ProcessRunner`] spawns a program, waits for it, and hands back the exit
//! code with both captured streams. A non-zero exit is an ordinary
//! [`ProcessOutput`]; only failing to start the process is an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use buildpipe_shared::{BuildError, Result};

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub cwd: PathBuf,
    /// Text written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
}

impl ProcessRequest {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            stdin: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument (lossy on non-UTF-8 paths).
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Display form used in logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The most useful diagnostic text: stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Spawns external programs and captures their output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `request` to completion. Errors only when the process cannot be
    /// started or its streams cannot be read.
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %request.program.display()))]
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        debug!(command = %request.command_line(), cwd = %request.cwd.display(), "spawning");

        let spawn_err = |source: std::io::Error| BuildError::Spawn {
            program: request.program.clone(),
            source,
        };

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        // Write stdin on its own task so a child that streams output before
        // draining its input cannot deadlock against us.
        let feeder = match &request.stdin {
            Some(input) => {
                let mut stdin = child.stdin.take().ok_or_else(|| BuildError::Spawn {
                    program: request.program.clone(),
                    source: std::io::Error::other("failed to capture stdin"),
                })?;
                let input = input.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(input.as_bytes()).await {
                        debug!(error = %e, "child closed stdin early");
                    }
                }))
            }
            None => None,
        };

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if let Some(feeder) = feeder {
            let _ = feeder.await;
        }

        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(exit_code = result.exit_code, "process finished");
        Ok(result)
    }
}
