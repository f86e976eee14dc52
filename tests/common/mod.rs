//! In-memory collaborators for orchestrator tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use walkdir::WalkDir;

use package_sync::config::Config;
use package_sync::error::{GitError, MirrorError, ReviewError};
use package_sync::git::{ConfigScope, LogSummary, PullStrategy, RepoStatus, Vcs, WorkingCopy};
use package_sync::mirror::{FsMirror, Mirror};
use package_sync::review::{NewPullRequest, PullRequest, ReviewApi};
use package_sync::sync::SyncSettings;

/// One recorded VCS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Clone { url: String },
    Open,
    SetRemote { name: String },
    Identity {
        name: String,
        dir: PathBuf,
        scope: ConfigScope,
    },
    CreateBranch(String),
    Checkout(String),
    Pull { branch: String, strategy: PullStrategy },
    Status,
    AddAll,
    Commit(String),
    Push { branch: String, set_upstream: bool },
    Diff(String),
    Log,
}

#[derive(Default)]
struct VcsState {
    calls: Vec<VcsCall>,
    existing_branches: HashSet<String>,
    failing_clones: HashSet<String>,
    failing_ops: HashSet<&'static str>,
    dirty: bool,
    changed_files: Vec<String>,
    commit_count: usize,
    cloned_dirs: Vec<PathBuf>,
}

#[derive(Clone, Default)]
pub struct FakeVcs {
    state: Arc<Mutex<VcsState>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working trees differ from the mirrored packages
    pub fn dirty(self) -> Self {
        self.state.lock().unwrap().dirty = true;
        self
    }

    pub fn with_existing_branch(self, branch: &str) -> Self {
        self.state.lock().unwrap().existing_branches.insert(branch.to_string());
        self
    }

    /// Clones of URLs containing `needle` fail
    pub fn failing_clone(self, needle: &str) -> Self {
        self.state.lock().unwrap().failing_clones.insert(needle.to_string());
        self
    }

    /// Calls to `op` ("identity", "create_branch", "push") fail with a git error
    pub fn failing(self, op: &'static str) -> Self {
        self.state.lock().unwrap().failing_ops.insert(op);
        self
    }

    pub fn with_history(self, commit_count: usize, changed: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.commit_count = commit_count;
            state.changed_files = changed.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn cloned_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().cloned_dirs.clone()
    }

    pub fn count(&self, pred: impl Fn(&VcsCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: VcsCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check(&self, op: &'static str) -> Result<(), GitError> {
        if self.state.lock().unwrap().failing_ops.contains(op) {
            return Err(GitError::CommandFailed {
                command: format!("git {}", op),
                stderr: format!("{} rejected", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn clone_repo(&self, url: &str, dir: &Path) -> Result<WorkingCopy, GitError> {
        self.record(VcsCall::Clone { url: url.to_string() });
        let fails = {
            let state = self.state.lock().unwrap();
            state.failing_clones.iter().any(|n| url.contains(n.as_str()))
        };
        if fails {
            return Err(GitError::CommandFailed {
                command: "git clone".to_string(),
                stderr: "repository not found".to_string(),
            });
        }
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("README.md"), "target").unwrap();
        self.state.lock().unwrap().cloned_dirs.push(dir.to_path_buf());
        Ok(WorkingCopy::new(dir))
    }

    async fn open(&self, dir: &Path) -> Result<WorkingCopy, GitError> {
        self.record(VcsCall::Open);
        Ok(WorkingCopy::new(dir))
    }

    async fn set_remote_url(&self, _wc: &WorkingCopy, name: &str, _url: &str) -> Result<(), GitError> {
        self.record(VcsCall::SetRemote { name: name.to_string() });
        Ok(())
    }

    async fn configure_identity(
        &self,
        wc: &WorkingCopy,
        name: &str,
        _email: &str,
        scope: ConfigScope,
    ) -> Result<(), GitError> {
        self.record(VcsCall::Identity {
            name: name.to_string(),
            dir: wc.path().to_path_buf(),
            scope,
        });
        self.check("identity")
    }

    async fn create_branch(&self, _wc: &WorkingCopy, name: &str) -> Result<(), GitError> {
        self.record(VcsCall::CreateBranch(name.to_string()));
        self.check("create_branch")?;
        let mut state = self.state.lock().unwrap();
        if !state.existing_branches.insert(name.to_string()) {
            return Err(GitError::BranchExists(name.to_string()));
        }
        Ok(())
    }

    async fn checkout_existing(&self, _wc: &WorkingCopy, name: &str) -> Result<(), GitError> {
        self.record(VcsCall::Checkout(name.to_string()));
        Ok(())
    }

    async fn pull(
        &self,
        _wc: &WorkingCopy,
        _remote: &str,
        branch: &str,
        strategy: PullStrategy,
    ) -> Result<(), GitError> {
        self.record(VcsCall::Pull {
            branch: branch.to_string(),
            strategy,
        });
        Ok(())
    }

    async fn status(&self, _wc: &WorkingCopy) -> Result<RepoStatus, GitError> {
        self.record(VcsCall::Status);
        let dirty = self.state.lock().unwrap().dirty;
        Ok(RepoStatus { is_clean: !dirty })
    }

    async fn add_all(&self, _wc: &WorkingCopy) -> Result<(), GitError> {
        self.record(VcsCall::AddAll);
        Ok(())
    }

    async fn commit(&self, _wc: &WorkingCopy, message: &str) -> Result<(), GitError> {
        self.record(VcsCall::Commit(message.to_string()));
        Ok(())
    }

    async fn push(
        &self,
        _wc: &WorkingCopy,
        _remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitError> {
        self.record(VcsCall::Push {
            branch: branch.to_string(),
            set_upstream,
        });
        self.check("push")
    }

    async fn diff(&self, _wc: &WorkingCopy, range: &str) -> Result<Vec<String>, GitError> {
        self.record(VcsCall::Diff(range.to_string()));
        Ok(self.state.lock().unwrap().changed_files.clone())
    }

    async fn log(&self, _wc: &WorkingCopy) -> Result<LogSummary, GitError> {
        self.record(VcsCall::Log);
        Ok(LogSummary {
            total_commit_count: self.state.lock().unwrap().commit_count,
        })
    }
}

#[derive(Default)]
struct ReviewState {
    open: Vec<PullRequest>,
    list_fails: bool,
    conflict_on_create: bool,
    created: Vec<(String, String, NewPullRequest)>,
}

#[derive(Clone, Default)]
pub struct FakeReview {
    state: Arc<Mutex<ReviewState>>,
}

impl FakeReview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_pr(self, number: u64, title: &str) -> Self {
        self.state.lock().unwrap().open.push(PullRequest {
            number,
            title: title.to_string(),
            html_url: None,
        });
        self
    }

    pub fn failing_list(self) -> Self {
        self.state.lock().unwrap().list_fails = true;
        self
    }

    pub fn conflict_on_create(self) -> Self {
        self.state.lock().unwrap().conflict_on_create = true;
        self
    }

    pub fn created(&self) -> Vec<(String, String, NewPullRequest)> {
        self.state.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl ReviewApi for FakeReview {
    async fn list_open_pull_requests(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<PullRequest>, ReviewError> {
        let state = self.state.lock().unwrap();
        if state.list_fails {
            return Err(ReviewError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(state.open.clone())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ReviewError> {
        let mut state = self.state.lock().unwrap();
        state
            .created
            .push((owner.to_string(), repo.to_string(), request.clone()));
        if state.conflict_on_create {
            return Err(ReviewError::Conflict {
                message: "No commits between master and head".to_string(),
            });
        }
        Ok(PullRequest {
            number: 100 + state.created.len() as u64,
            title: request.title.clone(),
            html_url: None,
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeMirror {
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl FakeMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mirror for FakeMirror {
    async fn mirror(&self, src: &Path, dst: &Path) -> Result<(), MirrorError> {
        self.calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));
        Ok(())
    }
}

/// Real filesystem mirror that lists every file under all destinations
/// written so far, taken after each call
#[derive(Clone, Default)]
pub struct SnapshotMirror {
    destinations: Arc<Mutex<Vec<PathBuf>>>,
    files: Arc<Mutex<Vec<PathBuf>>>,
}

impl SnapshotMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files present after the most recent mirror call
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mirror for SnapshotMirror {
    async fn mirror(&self, src: &Path, dst: &Path) -> Result<(), MirrorError> {
        FsMirror.mirror(src, dst).await?;

        let mut destinations = self.destinations.lock().unwrap();
        destinations.push(dst.to_path_buf());
        let files = destinations
            .iter()
            .flat_map(|root| WalkDir::new(root).into_iter().filter_map(Result::ok))
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().to_path_buf())
            .collect();
        *self.files.lock().unwrap() = files;
        Ok(())
    }
}

pub fn settings(source_dir: &Path, work_dir: &Path) -> SyncSettings {
    SyncSettings {
        token: "t0ken".to_string(),
        username: "blockerabot".to_string(),
        email: "bot@example.com".to_string(),
        identity_scope: ConfigScope::Local,
        create_sync_branch: true,
        base_branch: "master".to_string(),
        pull_strategy: PullStrategy::Merge,
        source_dir: source_dir.to_path_buf(),
        packages_dir: PathBuf::from("packages"),
        work_dir: work_dir.to_path_buf(),
    }
}

pub fn config(source_dir: &Path, work_dir: &Path) -> Config {
    Config {
        token: Some("t0ken".to_string()),
        source_dir: source_dir.to_path_buf(),
        source_repository: Some("org/app-one".to_string()),
        work_dir: Some(work_dir.to_path_buf()),
        ..Config::default()
    }
}

pub fn write_manifest(root: &Path, dir: &str, path: &str, repos: &[&str]) {
    let dir = root.join(dir);
    std::fs::create_dir_all(&dir).unwrap();
    let body = serde_json::json!({ "path": path, "dependent": { "repositories": repos } });
    std::fs::write(dir.join("blockera-pm.json"), body.to_string()).unwrap();
}
