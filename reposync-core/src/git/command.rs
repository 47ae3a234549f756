//! Async git subprocess runner

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::classify::classify;
use crate::config::GitConfig;
use crate::credentials::redact_url_credentials;
use crate::{Error, Result};

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr joined, for pattern matching
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs git with a fixed program, identity, timeout and extra config
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    timeout: Duration,
    config: Vec<String>,
}

impl GitRunner {
    pub fn new(config: &GitConfig) -> Self {
        let mut settings = vec![
            format!("user.name={}", config.author_name),
            format!("user.email={}", config.author_email),
            "commit.gpgsign=false".to_string(),
            "core.hooksPath=/dev/null".to_string(),
        ];
        settings.extend(config.extra_config.iter().cloned());

        Self {
            program: config.program.clone(),
            timeout: config.timeout,
            config: settings,
        }
    }

    /// Run git in `workdir`, returning its output whatever the exit code
    ///
    /// Errors only when git cannot be started, exceeds the timeout, or the
    /// token is cancelled. In the last two cases the child is killed.
    pub async fn run(
        &self,
        workdir: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<GitOutput> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !workdir.is_dir() {
            return Err(Error::WorkspaceIo(format!(
                "{} is not a directory",
                workdir.display()
            )));
        }

        let shown = redact_url_credentials(&args.join(" "));
        debug!(workdir = %workdir.display(), args = %shown, "Running git");

        let mut cmd = Command::new(&self.program);
        for setting in &self.config {
            cmd.arg("-c").arg(setting);
        }
        cmd.args(args)
            .current_dir(workdir)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::SyncTool(format!(
                    "git executable not found at '{}'. Is git installed?",
                    self.program
                ))
            } else {
                Error::SyncTool(format!("Failed to run git {}: {}", shown, e))
            }
        })?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            res = child.wait_with_output() => res
                .map_err(|e| Error::SyncTool(format!("Failed to wait for git {}: {}", shown, e)))?,
            _ = tokio::time::sleep(self.timeout) => {
                return Err(Error::SyncTool(format!(
                    "git {} timed out after {:?}",
                    shown, self.timeout
                )));
            }
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        Ok(GitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run git and turn a non-zero exit into a classified error
    pub async fn run_checked(
        &self,
        workdir: &Path,
        step: &str,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<GitOutput> {
        let output = self.run(workdir, args, cancel).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(classify(&output).into_error(step, &output))
        }
    }
}
