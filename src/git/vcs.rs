//! Version-control capability used by the sync orchestrator
//!
//! Every operation takes an explicit [`WorkingCopy`] handle so no process-wide
//! current directory is ever changed between targets.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GitError;

/// Handle to one local clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    path: PathBuf,
}

impl WorkingCopy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where `configure_identity` writes `user.name` / `user.email`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigScope {
    /// `.git/config` of the working copy
    #[default]
    Local,
    /// The invoking user's global config
    Global,
}

/// How `pull` integrates the remote branch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullStrategy {
    /// `--no-rebase`
    #[default]
    Merge,
    /// `--ff-only`
    FastForwardOnly,
}

/// Working-tree status summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoStatus {
    pub is_clean: bool,
}

/// History summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub total_commit_count: usize,
}

/// Version-control operations
///
/// `create_branch` must report an already existing branch as
/// [`GitError::BranchExists`]; callers rely on that variant to switch to the
/// branch instead of failing.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `url` into `dir` (which must not exist yet)
    async fn clone_repo(&self, url: &str, dir: &Path) -> Result<WorkingCopy, GitError>;

    /// Wrap an existing checkout
    async fn open(&self, dir: &Path) -> Result<WorkingCopy, GitError>;

    async fn set_remote_url(&self, wc: &WorkingCopy, name: &str, url: &str) -> Result<(), GitError>;

    async fn configure_identity(
        &self,
        wc: &WorkingCopy,
        name: &str,
        email: &str,
        scope: ConfigScope,
    ) -> Result<(), GitError>;

    /// Create `name` from HEAD and switch to it
    async fn create_branch(&self, wc: &WorkingCopy, name: &str) -> Result<(), GitError>;

    /// Switch to a branch that exists locally or on `origin`
    async fn checkout_existing(&self, wc: &WorkingCopy, name: &str) -> Result<(), GitError>;

    /// Integrate `remote/branch` into the current branch (never rebases)
    async fn pull(
        &self,
        wc: &WorkingCopy,
        remote: &str,
        branch: &str,
        strategy: PullStrategy,
    ) -> Result<(), GitError>;

    async fn status(&self, wc: &WorkingCopy) -> Result<RepoStatus, GitError>;

    async fn add_all(&self, wc: &WorkingCopy) -> Result<(), GitError>;

    async fn commit(&self, wc: &WorkingCopy, message: &str) -> Result<(), GitError>;

    async fn push(
        &self,
        wc: &WorkingCopy,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitError>;

    /// Paths changed in a revision range such as `HEAD^..HEAD`
    async fn diff(&self, wc: &WorkingCopy, range: &str) -> Result<Vec<String>, GitError>;

    async fn log(&self, wc: &WorkingCopy) -> Result<LogSummary, GitError>;
}
