//! Build backends: where build commands run

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::PipelineError;

/// Result of one build command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr lines
    pub log: String,
}

/// Runs a shell command in a working directory
#[async_trait]
pub trait BuildBackend: Send + Sync {
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutcome, PipelineError>;
}

/// Runs commands with `bash -c` on the host
#[derive(Debug, Default)]
pub struct ShellBackend;

#[async_trait]
impl BuildBackend for ShellBackend {
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutcome, PipelineError> {
        info!("Running build command: {}", command);
        let mut cmd = Command::new("bash");
        cmd.args(["-c", command]).current_dir(dir).envs(env);
        run_streaming(cmd).await
    }
}

/// Runs commands inside a throwaway container with the working directory
/// mounted at `/workspace`
#[derive(Debug, Clone)]
pub struct ContainerBackend {
    image: String,
}

impl ContainerBackend {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    fn docker_args(
        &self,
        command: &str,
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/workspace", dir.display()),
            "-w".to_string(),
            "/workspace".to_string(),
        ];
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.extend([
            self.image.clone(),
            "bash".to_string(),
            "-c".to_string(),
            command.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl BuildBackend for ContainerBackend {
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<CommandOutcome, PipelineError> {
        info!("Running build command in {}: {}", self.image, command);
        let mut cmd = Command::new("docker");
        cmd.args(self.docker_args(command, dir, env));
        run_streaming(cmd).await
    }
}

/// Spawn `cmd` and collect stdout and stderr line by line as they arrive
async fn run_streaming(mut cmd: Command) -> Result<CommandOutcome, PipelineError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| PipelineError::ExecutionFailure(format!("failed to spawn command: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PipelineError::Internal("child stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| PipelineError::Internal("child stderr not captured".to_string()))?;

    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();
    let mut log = String::new();
    let (mut stdout_done, mut stderr_done) = (false, false);

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = stdout.next_line(), if !stdout_done => match line {
                Ok(Some(line)) => push_line(&mut log, &line),
                _ => stdout_done = true,
            },
            line = stderr.next_line(), if !stderr_done => match line {
                Ok(Some(line)) => push_line(&mut log, &line),
                _ => stderr_done = true,
            },
        }
    }

    let status = child.wait().await?;
    Ok(CommandOutcome {
        success: status.success(),
        exit_code: status.code(),
        log,
    })
}

fn push_line(log: &mut String, line: &str) {
    debug!("build: {}", line);
    log.push_str(line);
    log.push('\n');
}
