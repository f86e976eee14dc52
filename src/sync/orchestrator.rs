//! Per-target sync state machine
//!
//! ```text
//! Cloning → Configuring → BranchResolution → Syncing → CommitDecision
//!     → PushAndPr | DoneClean → Cleanup
//! ```
//!
//! Any step may divert to `Failed`; `Cleanup` always runs last and removes the
//! working copy. Nothing raised for one target escapes [`SyncOrchestrator::sync_target`].

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{Conventions, find_open_sync_prs};
use crate::config::Config;
use crate::error::{ConfigError, Error, GitError, MirrorError, ReviewError};
use crate::git::{ConfigScope, PullStrategy, Vcs, WorkingCopy};
use crate::mirror::Mirror;
use crate::report::{Severity, emit, redact_credentials};
use crate::review::{NewPullRequest, ReviewApi};
use crate::target::{ResolvedTarget, authenticated_url};

const ORIGIN: &str = "origin";

/// States a target passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Cloning,
    Configuring,
    BranchResolution,
    Syncing,
    CommitDecision,
    PushAndPr,
    DoneClean,
    Failed,
    Cleanup,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Cloning => "cloning",
            SyncState::Configuring => "configuring",
            SyncState::BranchResolution => "branch resolution",
            SyncState::Syncing => "syncing",
            SyncState::CommitDecision => "commit decision",
            SyncState::PushAndPr => "push and pull request",
            SyncState::DoneClean => "done (clean)",
            SyncState::Failed => "failed",
            SyncState::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// What happened on the review host for a pushed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrAction {
    Created { number: u64 },
    AlreadyOpen { number: u64 },
    /// The host answered 422 (usually "no commits between base and head")
    Conflict { message: String },
    /// Changes were pushed straight to the base branch
    NotRequested,
}

/// Final result for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Synced { pr: PrAction },
    /// Nothing to commit
    Clean,
    Failed { state: SyncState, error: String },
}

impl TargetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TargetOutcome::Failed { .. })
    }
}

/// Visited states and outcome of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub url: String,
    pub short_id: String,
    pub states: Vec<SyncState>,
    pub outcome: TargetOutcome,
}

/// Inputs the orchestrator needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub token: String,
    pub username: String,
    pub email: String,
    pub identity_scope: ConfigScope,
    pub create_sync_branch: bool,
    pub base_branch: String,
    pub pull_strategy: PullStrategy,
    pub source_dir: PathBuf,
    pub packages_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("token"))?;

        Ok(Self {
            token,
            username: config.username.clone(),
            email: config.email.clone(),
            identity_scope: config.identity_scope,
            create_sync_branch: config.create_sync_branch,
            base_branch: config.base_branch.clone(),
            pull_strategy: config.pull_strategy,
            source_dir: config.source_dir.clone(),
            packages_dir: config.packages_dir.clone(),
            work_dir: config.work_dir(),
        })
    }
}

/// Error raised inside a target, tagged with the state it happened in
#[derive(Debug)]
struct StepFailure {
    state: SyncState,
    error: Error,
}

fn at<E: Into<Error>>(state: SyncState) -> impl FnOnce(E) -> StepFailure {
    move |e| StepFailure {
        state,
        error: e.into(),
    }
}

/// Whether mirroring one package would overwrite part of another
///
/// Two `(src, dst)` pairs clash when one destination lies inside the other but
/// the sources are not nested the same way.
fn clashes(a: (&Path, &Path), b: (&Path, &Path)) -> bool {
    fn nested(inner: (&Path, &Path), outer: (&Path, &Path)) -> bool {
        match inner.1.strip_prefix(outer.1) {
            Ok(rest) => outer.0.join(rest) != inner.0,
            Err(_) => false,
        }
    }
    nested(a, b) || nested(b, a)
}

/// Drives one target at a time through the sync states
pub struct SyncOrchestrator {
    vcs: Arc<dyn Vcs>,
    review: Arc<dyn ReviewApi>,
    mirror: Arc<dyn Mirror>,
    settings: SyncSettings,
    conventions: Conventions,
}

impl SyncOrchestrator {
    pub fn new(
        vcs: Arc<dyn Vcs>,
        review: Arc<dyn ReviewApi>,
        mirror: Arc<dyn Mirror>,
        settings: SyncSettings,
        conventions: Conventions,
    ) -> Self {
        Self {
            vcs,
            review,
            mirror,
            settings,
            conventions,
        }
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Run one target to completion; never returns an error
    #[instrument(skip_all, fields(target = %target.short_id))]
    pub async fn sync_target(&self, target: &ResolvedTarget) -> TargetReport {
        let dir = self.settings.work_dir.join(format!(
            "{}-{}",
            target.short_id,
            Uuid::new_v4().simple()
        ));
        let mut states = Vec::new();

        let outcome = match self.drive(target, &dir, &mut states).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                states.push(SyncState::Failed);
                let error = redact_credentials(&failure.error.to_string());
                emit(
                    Severity::Error,
                    format!("{}: failed during {}: {}", target.short_id, failure.state, error),
                );
                TargetOutcome::Failed {
                    state: failure.state,
                    error,
                }
            }
        };

        states.push(SyncState::Cleanup);
        self.cleanup(&dir).await;

        TargetReport {
            url: target.url.clone(),
            short_id: target.short_id.clone(),
            states,
            outcome,
        }
    }

    async fn drive(
        &self,
        target: &ResolvedTarget,
        dir: &Path,
        states: &mut Vec<SyncState>,
    ) -> Result<TargetOutcome, StepFailure> {
        let s = &self.settings;

        states.push(SyncState::Cloning);
        let remote_url =
            authenticated_url(&target.url, &s.token).map_err(at(SyncState::Cloning))?;
        let wc = self
            .vcs
            .clone_repo(&remote_url, dir)
            .await
            .map_err(at(SyncState::Cloning))?;
        emit(Severity::Info, format!("Cloned {} into {}", target.url, dir.display()));

        states.push(SyncState::Configuring);
        self.configure(&wc, &remote_url)
            .await
            .map_err(at(SyncState::Configuring))?;

        states.push(SyncState::BranchResolution);
        let branch = self
            .resolve_branch(&wc)
            .await
            .map_err(at(SyncState::BranchResolution))?;

        states.push(SyncState::Syncing);
        self.sync_packages(&wc, target)
            .await
            .map_err(at(SyncState::Syncing))?;

        states.push(SyncState::CommitDecision);
        let status = self.vcs.status(&wc).await.map_err(at(SyncState::CommitDecision))?;
        if status.is_clean {
            states.push(SyncState::DoneClean);
            emit(
                Severity::Success,
                format!("{}: already up to date, nothing to commit", target.short_id),
            );
            return Ok(TargetOutcome::Clean);
        }
        self.vcs.add_all(&wc).await.map_err(at(SyncState::CommitDecision))?;
        self.vcs
            .commit(&wc, &self.conventions.commit_message())
            .await
            .map_err(at(SyncState::CommitDecision))?;

        states.push(SyncState::PushAndPr);
        self.vcs
            .push(&wc, ORIGIN, &branch, true)
            .await
            .map_err(at(SyncState::PushAndPr))?;
        emit(Severity::Info, format!("Changes pushed to {} ({})", target.short_id, branch));

        let pr = if s.create_sync_branch {
            self.ensure_pull_request(target, &branch)
                .await
                .map_err(at(SyncState::PushAndPr))?
        } else {
            PrAction::NotRequested
        };

        emit(Severity::Success, format!("{}: synced", target.short_id));
        Ok(TargetOutcome::Synced { pr })
    }

    async fn configure(&self, wc: &WorkingCopy, remote_url: &str) -> Result<(), GitError> {
        self.vcs.set_remote_url(wc, ORIGIN, remote_url).await?;
        let s = &self.settings;
        self.vcs
            .configure_identity(wc, &s.username, &s.email, s.identity_scope)
            .await
    }

    /// Switch to the branch changes are committed on and return its name
    async fn resolve_branch(&self, wc: &WorkingCopy) -> Result<String, GitError> {
        if !self.settings.create_sync_branch {
            let base = self.settings.base_branch.clone();
            self.vcs.checkout_existing(wc, &base).await?;
            return Ok(base);
        }

        let branch = self.conventions.sync_branch();
        match self.vcs.create_branch(wc, &branch).await {
            Ok(()) => {
                emit(Severity::Info, format!("Created branch {}", branch));
            }
            Err(GitError::BranchExists(_)) => {
                emit(Severity::Info, format!("Reusing existing branch {}", branch));
                self.vcs.checkout_existing(wc, &branch).await?;
                self.vcs
                    .pull(wc, ORIGIN, &branch, self.settings.pull_strategy)
                    .await?;
            }
            Err(e) => return Err(e),
        }
        Ok(branch)
    }

    /// Where `package` lands inside the working copy
    ///
    /// The declared path is kept whole under `packages_dir` (minus a leading
    /// `packages_dir` component), so `packages/ui` and `shared/ui` never share
    /// a destination.
    fn destination(&self, wc: &WorkingCopy, package: &str) -> Result<PathBuf, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: "path".to_string(),
            reason: format!("'{}' {}", package, reason),
        };

        let declared = Path::new(package);
        if declared
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(invalid("must be a relative path inside the repository"));
        }

        let packages_dir = &self.settings.packages_dir;
        let relative = declared.strip_prefix(packages_dir).unwrap_or(declared);
        if !relative.components().any(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid("does not name a package directory"));
        }
        Ok(wc.path().join(packages_dir).join(relative))
    }

    /// Mirror every package of `target`
    ///
    /// Destinations are checked for collisions before anything is written.
    async fn sync_packages(&self, wc: &WorkingCopy, target: &ResolvedTarget) -> Result<(), Error> {
        let mut planned: Vec<(&str, PathBuf, PathBuf)> = Vec::new();

        for package in &target.package_paths {
            let src = self.settings.source_dir.join(package);
            let dst = self.destination(wc, package)?;

            if let Some((first, _, _)) = planned
                .iter()
                .find(|(_, other_src, other_dst)| {
                    clashes(
                        (src.as_path(), dst.as_path()),
                        (other_src.as_path(), other_dst.as_path()),
                    )
                })
            {
                return Err(MirrorError::DestinationConflict {
                    destination: dst,
                    first: first.to_string(),
                    second: package.clone(),
                }
                .into());
            }
            planned.push((package.as_str(), src, dst));
        }

        for (_, src, dst) in &planned {
            self.mirror.mirror(src, dst).await?;
            emit(
                Severity::Info,
                format!("Synced package from {} to {}", src.display(), dst.display()),
            );
        }
        Ok(())
    }

    async fn ensure_pull_request(
        &self,
        target: &ResolvedTarget,
        branch: &str,
    ) -> Result<PrAction, ReviewError> {
        let title = self.conventions.pr_title();
        let open =
            find_open_sync_prs(self.review.as_ref(), &target.owner, &target.short_id, &title).await;
        if let Some(existing) = open.first() {
            emit(
                Severity::Info,
                format!("{}: pull request #{} already open", target.short_id, existing.number),
            );
            return Ok(PrAction::AlreadyOpen {
                number: existing.number,
            });
        }

        let request = NewPullRequest {
            title,
            head: branch.to_string(),
            base: self.settings.base_branch.clone(),
            body: self.conventions.pr_body(),
        };
        match self
            .review
            .create_pull_request(&target.owner, &target.short_id, &request)
            .await
        {
            Ok(pr) => {
                emit(
                    Severity::Success,
                    format!("{}: opened pull request #{}", target.short_id, pr.number),
                );
                Ok(PrAction::Created { number: pr.number })
            }
            Err(ReviewError::Conflict { message }) => {
                emit(
                    Severity::Warning,
                    format!("{}: pull request not created: {}", target.short_id, message),
                );
                Ok(PrAction::Conflict { message })
            }
            Err(e) => Err(e),
        }
    }

    async fn cleanup(&self, dir: &Path) {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!("Removed working copy {:?}", dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove working copy {:?}: {}", dir, e),
        }
    }
}
