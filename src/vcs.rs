//! Version-control access through an external command runner.
//!
//! The workflow only ever needs four git operations per cycle: sync with the
//! remote, stage one file, commit, and push. [`GitClient`] exposes exactly
//! those on top of a [`CommandRunner`], turning a non-zero exit into a
//! [`SystemError::VersionControl`] that carries the tool's own diagnostics.

use crate::error::{Result, SystemError, VcsStep};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful, silent exit.
    pub fn ok() -> Self {
        Self {
            status: Some(0),
            ..Default::default()
        }
    }

    /// A failed exit with `code` and `stderr`.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Best available explanation of a failure: stderr, else stdout, else the exit status.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs an external program and reports how it exited.
///
/// An `Err` means the program could not be started at all; a program that ran
/// and failed is an `Ok` output with a non-zero status.
pub trait CommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> impl std::future::Future<Output = Result<CommandOutput>> + Send;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        debug!("Running {} {:?} in {}", program, args, cwd.display());

        let mut command = Command::new(program);
        command.args(args).current_dir(cwd).stdin(Stdio::null());
        // A terminal Ctrl+C signals the whole foreground group; keep children out of it
        // so an interrupt only stops the scheduler at the next poll boundary.
        #[cfg(unix)]
        command.process_group(0);

        let output = command
            .output()
            .await
            .map_err(|e| SystemError::unclassified(format!("Failed to run {}: {}", program, e)))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The four git operations a cycle performs, run inside one working tree.
pub struct GitClient<R> {
    runner: R,
    repo_path: PathBuf,
    remote: String,
    branch: String,
}

impl<R: CommandRunner> GitClient<R> {
    pub fn new(
        runner: R,
        repo_path: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            repo_path: repo_path.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Rebase local history onto the remote branch. Conflicts are not resolved.
    ///
    /// Uncommitted edits to tracked files (the freshly appended log line) are
    /// stashed for the rebase and restored afterwards.
    pub async fn sync(&self) -> Result<()> {
        self.git(
            VcsStep::Sync,
            &[
                "pull",
                "--rebase",
                "--autostash",
                self.remote.as_str(),
                self.branch.as_str(),
            ],
        )
        .await
    }

    /// Stage a single path, relative to the repository root.
    pub async fn stage(&self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.git(VcsStep::Stage, &["add", path.as_ref()]).await
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        self.git(VcsStep::Commit, &["commit", "-m", message]).await
    }

    pub async fn push(&self) -> Result<()> {
        self.git(VcsStep::Push, &["push", self.remote.as_str(), self.branch.as_str()])
            .await
    }

    async fn git(&self, step: VcsStep, args: &[&str]) -> Result<()> {
        let output = self
            .runner
            .run("git", args, &self.repo_path)
            .await
            .map_err(|e| SystemError::vcs_error(step, e.to_string()))?;

        if output.success() {
            debug!("git {} succeeded", step);
            Ok(())
        } else {
            Err(SystemError::vcs_error(step, output.diagnostic()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn client(runner: &ScriptedRunner) -> GitClient<ScriptedRunner> {
        GitClient::new(runner.clone(), "/repo", "origin", "main")
    }

    #[tokio::test]
    async fn test_operations_issue_expected_commands() {
        let runner = ScriptedRunner::new();
        let git = client(&runner);

        git.sync().await.unwrap();
        git.stage(Path::new("data/daily_log.txt")).await.unwrap();
        git.commit("Morning: CPU 1.0%").await.unwrap();
        git.push().await.unwrap();

        let calls = runner.invocations();
        assert_eq!(
            calls.iter().map(|c| c.args.join(" ")).collect::<Vec<_>>(),
            vec![
                "pull --rebase --autostash origin main",
                "add data/daily_log.txt",
                "commit -m Morning: CPU 1.0%",
                "push origin main",
            ]
        );
        assert!(calls.iter().all(|c| c.program == "git"));
        assert!(calls.iter().all(|c| c.cwd == Path::new("/repo")));
    }

    #[tokio::test]
    async fn test_failure_carries_step_and_diagnostic() {
        let runner = ScriptedRunner::new()
            .fail_on("push", CommandOutput::failed(1, "! [rejected] main -> main (fetch first)\n"));
        let git = client(&runner);

        let err = git.push().await.unwrap_err();
        assert_eq!(err.vcs_step(), Some(VcsStep::Push));
        assert!(err.to_string().contains("[rejected]"));
    }

    #[test]
    fn test_diagnostic_fallbacks() {
        let mut output = CommandOutput::failed(128, "");
        assert_eq!(output.diagnostic(), "exited with status 128");

        output.stdout = "nothing to commit\n".to_string();
        assert_eq!(output.diagnostic(), "nothing to commit");

        output.status = None;
        output.stdout.clear();
        assert_eq!(output.diagnostic(), "terminated by signal");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemCommandRunner;
        let cwd = std::env::temp_dir();

        let missing = runner.run("pulse-commit-no-such-program", &[], &cwd).await;
        assert!(missing.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_system_runner_children_lead_their_own_group() {
        let runner = SystemCommandRunner;
        let cwd = std::env::temp_dir();

        let output = runner
            .run(
                "sh",
                &["-c", "read -r _ _ _ _ pgrp _ < /proc/$$/stat; echo \"$$ $pgrp\""],
                &cwd,
            )
            .await
            .unwrap();
        assert!(output.success(), "{}", output.diagnostic());

        let ids: Vec<&str> = output.stdout.split_whitespace().collect();
        assert_eq!(ids.len(), 2, "{:?}", output.stdout);
        assert_eq!(ids[0], ids[1]);
    }
}
