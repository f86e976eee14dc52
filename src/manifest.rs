//! Manifest discovery and aggregation
//!
//! A manifest (`blockera-pm.json`) declares one shared package path and the
//! repositories that depend on it:
//!
//! ```json
//! { "path": "packages/ui",
//!   "dependent": { "repositories": ["https://github.com/org/app.git"] } }
//! ```
//!
//! All manifests under a search root are folded into a [`TargetMap`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ManifestError, Result};

/// File name every manifest must carry
pub const MANIFEST_FILE_NAME: &str = "blockera-pm.json";

/// Directories never searched for manifests
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// One parsed manifest file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ManifestRecord {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub dependent: Option<Dependents>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dependents {
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl ManifestRecord {
    /// `(path, repositories)` when the record is usable
    fn declaration(&self) -> Option<(&str, &[String])> {
        let path = self.path.as_deref().filter(|p| !p.trim().is_empty())?;
        let repos = self.dependent.as_ref()?.repositories.as_slice();
        if repos.is_empty() {
            return None;
        }
        Some((path, repos))
    }
}

/// One target repository and the package paths declared for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub url: String,
    pub paths: Vec<String>,
}

/// Target repository URL → package paths, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMap {
    entries: Vec<TargetEntry>,
    dedupe_paths: bool,
}

impl TargetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map that keeps each path at most once per repository
    pub fn deduplicating() -> Self {
        Self {
            entries: Vec::new(),
            dedupe_paths: true,
        }
    }

    /// Append `path` to the bucket of `url`
    pub fn insert(&mut self, url: &str, path: &str) {
        let dedupe = self.dedupe_paths;
        match self.entries.iter_mut().find(|e| e.url == url) {
            Some(entry) => {
                if !(dedupe && entry.paths.iter().any(|p| p == path)) {
                    entry.paths.push(path.to_string());
                }
            }
            None => self.entries.push(TargetEntry {
                url: url.to_string(),
                paths: vec![path.to_string()],
            }),
        }
    }

    /// Fold one record into the map; unusable records are ignored
    pub fn add_record(&mut self, record: &ManifestRecord) -> bool {
        let Some((path, repos)) = record.declaration() else {
            return false;
        };
        for repo in repos {
            self.insert(repo.trim(), path);
        }
        true
    }

    pub fn get(&self, url: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| e.paths.as_slice())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetEntry> {
        self.entries.iter()
    }

    /// Every distinct package path across all targets, in first-seen order
    pub fn all_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for entry in &self.entries {
            for path in &entry.paths {
                if !paths.contains(&path.as_str()) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How [`aggregate`] treats manifests it cannot parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidManifestPolicy {
    /// Abort the whole run
    #[default]
    Fail,
    /// Log a warning and continue with the next file
    Skip,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Find every manifest file below `root`, in a stable order
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ManifestError::UnreadableRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = entry.map_err(|e| ManifestError::UnreadableRoot {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// Read and parse one manifest file
pub fn read_manifest(path: &Path) -> std::result::Result<ManifestRecord, ManifestError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the target map from every manifest below `root`
#[instrument(skip_all, fields(root = %root.display()))]
pub fn aggregate(root: &Path, policy: InvalidManifestPolicy, dedupe_paths: bool) -> Result<TargetMap> {
    let mut map = if dedupe_paths {
        TargetMap::deduplicating()
    } else {
        TargetMap::new()
    };

    for file in discover(root)? {
        let record = match read_manifest(&file) {
            Ok(record) => record,
            Err(e) => match policy {
                InvalidManifestPolicy::Fail => return Err(e.into()),
                InvalidManifestPolicy::Skip => {
                    warn!("Skipping manifest: {}", e);
                    continue;
                }
            },
        };

        if !map.add_record(&record) {
            debug!("Ignoring manifest without path or dependents: {:?}", file);
        }
    }

    Ok(map)
}
