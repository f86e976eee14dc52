//! Read-only repository queries using gitoxide
//!
//! Ref lookups and history walks go through gitoxide; anything that mutates
//! the repository goes through the git CLI in [`super::GitCli`].

use std::path::{Path, PathBuf};

use gix::Repository;
use tracing::{debug, instrument};

use crate::error::GitError;

/// Read-only view of a repository on disk
pub struct GitBackend {
    /// The gitoxide repository handle
    repo: Repository,
    /// Path to the repository
    path: PathBuf,
}

impl GitBackend {
    /// Open an existing repository
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref().to_path_buf();

        let repo = gix::open(&path).map_err(|e| {
            if e.to_string().to_lowercase().contains("git repository") {
                GitError::NotARepository(path.clone())
            } else {
                GitError::Gix(e.to_string())
            }
        })?;

        debug!("Opened repository at {:?}", path);

        Ok(Self { repo, path })
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether a fully-qualified reference exists
    fn reference_exists(&self, full_name: &str) -> Result<bool, GitError> {
        let refs = self
            .repo
            .references()
            .map_err(|e| GitError::Gix(e.to_string()))?;

        for reference in refs.all().map_err(|e| GitError::Gix(e.to_string()))? {
            match reference {
                Ok(r) => {
                    if r.name().as_bstr() == full_name.as_bytes() {
                        return Ok(true);
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(false)
    }

    /// Check if a local branch exists
    pub fn branch_exists(&self, branch_name: &str) -> Result<bool, GitError> {
        self.reference_exists(&format!("refs/heads/{}", branch_name))
    }

    /// Check if a remote-tracking branch exists (e.g. `origin/<branch>` after a clone)
    pub fn remote_branch_exists(&self, remote: &str, branch_name: &str) -> Result<bool, GitError> {
        self.reference_exists(&format!("refs/remotes/{}/{}", remote, branch_name))
    }

    /// Number of commits reachable from HEAD (0 for an unborn branch)
    pub fn commit_count(&self) -> Result<usize, GitError> {
        let head = self.repo.head().map_err(|e| GitError::Gix(e.to_string()))?;
        let Some(id) = head.id() else {
            return Ok(0);
        };

        let walk = id
            .ancestors()
            .all()
            .map_err(|e| GitError::Gix(e.to_string()))?;

        let mut count = 0;
        for info in walk {
            info.map_err(|e| GitError::Gix(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }
}
