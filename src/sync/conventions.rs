//! Naming shared by every target of one source repository

/// Names derived from the source repository's short name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conventions {
    source_name: String,
}

impl Conventions {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Branch reused across runs in every target
    pub fn sync_branch(&self) -> String {
        format!("sync-packages-from-{}", self.source_name)
    }

    /// Title that marks a sync pull request as already open
    pub fn pr_title(&self) -> String {
        format!("Sync package from {} Repo", self.source_name)
    }

    pub fn pr_body(&self) -> String {
        format!("This PR syncs the package from the {} repo.", self.source_name)
    }

    pub fn commit_message(&self) -> String {
        format!("Sync shared packages from {} repo", self.source_name)
    }
}
