//! Git CLI implementation of [`Vcs`]
//!
//! Mutations shell out to `git` with the working copy as the command's
//! directory; ref and history lookups use [`GitBackend`].

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{ConfigScope, GitBackend, LogSummary, PullStrategy, RepoStatus, Vcs, WorkingCopy};
use crate::error::GitError;
use crate::report::redact_credentials;

/// Remote name used when probing for an existing sync branch
const DEFAULT_REMOTE: &str = "origin";

/// Runs git commands against explicit working copies
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Check if git is installed and accessible
    pub async fn check_installed(&self) -> Result<(), GitError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        if output.status.success() {
            debug!("git version: {}", String::from_utf8_lossy(&output.stdout).trim());
            Ok(())
        } else {
            Err(GitError::Spawn("git --version exited unsuccessfully".to_string()))
        }
    }

    /// Execute a git command and return its stdout
    async fn execute(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let command = redact_credentials(&format!("git {}", args.join(" ")));
        debug!("running {}", command);

        let output = cmd
            .output()
            .await
            .map_err(|e| GitError::Spawn(format!("{}: {}", command, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(GitError::CommandFailed {
                command,
                stderr: redact_credentials(stderr.trim()),
            })
        }
    }

    async fn run_in(&self, wc: &WorkingCopy, args: &[&str]) -> Result<String, GitError> {
        self.execute(Some(wc.path()), args).await
    }
}

#[async_trait]
impl Vcs for GitCli {
    #[instrument(skip_all, fields(dir = %dir.display()))]
    async fn clone_repo(&self, url: &str, dir: &Path) -> Result<WorkingCopy, GitError> {
        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GitError::Spawn(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let dir_arg = dir.to_string_lossy();
        self.execute(None, &["clone", url, &*dir_arg]).await?;

        info!("Cloned {} into {:?}", redact_credentials(url), dir);
        Ok(WorkingCopy::new(dir))
    }

    async fn open(&self, dir: &Path) -> Result<WorkingCopy, GitError> {
        let backend = GitBackend::open(dir)?;
        Ok(WorkingCopy::new(backend.path()))
    }

    #[instrument(skip(self, wc, url))]
    async fn set_remote_url(&self, wc: &WorkingCopy, name: &str, url: &str) -> Result<(), GitError> {
        self.run_in(wc, &["remote", "set-url", name, url]).await?;
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn configure_identity(
        &self,
        wc: &WorkingCopy,
        name: &str,
        email: &str,
        scope: ConfigScope,
    ) -> Result<(), GitError> {
        let scope_flag = match scope {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
        };
        self.run_in(wc, &["config", scope_flag, "user.name", name]).await?;
        self.run_in(wc, &["config", scope_flag, "user.email", email]).await?;
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn create_branch(&self, wc: &WorkingCopy, name: &str) -> Result<(), GitError> {
        let exists = {
            let backend = GitBackend::open(wc.path())?;
            backend.branch_exists(name)? || backend.remote_branch_exists(DEFAULT_REMOTE, name)?
        };
        if exists {
            debug!("Branch {} exists, not creating", name);
            return Err(GitError::BranchExists(name.to_string()));
        }

        self.run_in(wc, &["checkout", "-b", name]).await?;
        info!("Created branch {}", name);
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn checkout_existing(&self, wc: &WorkingCopy, name: &str) -> Result<(), GitError> {
        self.run_in(wc, &["checkout", name]).await?;
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn pull(
        &self,
        wc: &WorkingCopy,
        remote: &str,
        branch: &str,
        strategy: PullStrategy,
    ) -> Result<(), GitError> {
        let strategy_flag = match strategy {
            PullStrategy::Merge => "--no-rebase",
            PullStrategy::FastForwardOnly => "--ff-only",
        };
        self.run_in(wc, &["pull", strategy_flag, remote, branch]).await?;
        Ok(())
    }

    async fn status(&self, wc: &WorkingCopy) -> Result<RepoStatus, GitError> {
        let porcelain = self.run_in(wc, &["status", "--porcelain"]).await?;
        Ok(RepoStatus {
            is_clean: porcelain.trim().is_empty(),
        })
    }

    async fn add_all(&self, wc: &WorkingCopy) -> Result<(), GitError> {
        self.run_in(wc, &["add", "--all"]).await?;
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn commit(&self, wc: &WorkingCopy, message: &str) -> Result<(), GitError> {
        self.run_in(wc, &["commit", "-m", message]).await?;
        Ok(())
    }

    #[instrument(skip(self, wc))]
    async fn push(
        &self,
        wc: &WorkingCopy,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitError> {
        if set_upstream {
            self.run_in(wc, &["push", "--set-upstream", remote, branch]).await?;
        } else {
            self.run_in(wc, &["push", remote, branch]).await?;
        }
        Ok(())
    }

    async fn diff(&self, wc: &WorkingCopy, range: &str) -> Result<Vec<String>, GitError> {
        let output = self.run_in(wc, &["diff", "--name-only", range]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn log(&self, wc: &WorkingCopy) -> Result<LogSummary, GitError> {
        let backend = GitBackend::open(wc.path())?;
        Ok(LogSummary {
            total_commit_count: backend.commit_count()?,
        })
    }
}
