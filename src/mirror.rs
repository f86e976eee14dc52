//! Destructive directory mirroring
//!
//! After `mirror(src, dst)` the tree under `dst` is exactly the tree under
//! `src`: missing files are copied, changed files overwritten, and anything
//! present only in `dst` removed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::error::MirrorError;

/// Directory mirroring capability
#[async_trait]
pub trait Mirror: Send + Sync {
    async fn mirror(&self, src: &Path, dst: &Path) -> Result<(), MirrorError>;
}

/// Counts from one mirror pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Local filesystem mirror
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMirror;

#[async_trait]
impl Mirror for FsMirror {
    #[instrument(skip_all, fields(src = %src.display(), dst = %dst.display()))]
    async fn mirror(&self, src: &Path, dst: &Path) -> Result<(), MirrorError> {
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        let stats = tokio::task::spawn_blocking(move || mirror_tree(&src, &dst))
            .await
            .map_err(|e| MirrorError::Join(e.to_string()))??;
        debug!(
            "mirror done: {} copied, {} unchanged, {} removed",
            stats.copied, stats.unchanged, stats.removed
        );
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MirrorError + '_ {
    move |source| MirrorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_err(root: &Path, e: walkdir::Error) -> MirrorError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    MirrorError::Io {
        path,
        source: e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
    }
}

/// Blocking implementation of the mirror
pub fn mirror_tree(src: &Path, dst: &Path) -> Result<MirrorStats, MirrorError> {
    if !src.is_dir() {
        return Err(MirrorError::MissingSource(src.to_path_buf()));
    }

    let mut stats = MirrorStats::default();
    let mut wanted: HashSet<PathBuf> = HashSet::new();

    if dst.exists() && !dst.is_dir() {
        fs::remove_file(dst).map_err(io_err(dst))?;
    }
    fs::create_dir_all(dst).map_err(io_err(dst))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| walk_err(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| MirrorError::Io {
                path: entry.path().to_path_buf(),
                source: std::io::Error::other(e),
            })?
            .to_path_buf();
        let target = dst.join(&rel);

        if entry.file_type().is_dir() {
            if target.exists() && !target.is_dir() {
                fs::remove_file(&target).map_err(io_err(&target))?;
            }
            fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(io_err(&target))?;
            }
            if same_contents(entry.path(), &target)? {
                stats.unchanged += 1;
            } else {
                fs::copy(entry.path(), &target).map_err(io_err(&target))?;
                stats.copied += 1;
            }
        }
        wanted.insert(rel);
    }

    // Deepest paths first so directories are emptied before they are checked.
    let mut stale: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dst).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| walk_err(dst, e))?;
        let Ok(rel) = entry.path().strip_prefix(dst) else {
            continue;
        };
        if !wanted.contains(rel) {
            stale.push(entry.path().to_path_buf());
        }
    }
    for path in stale {
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(io_err(&path))?;
        } else if path.exists() {
            fs::remove_file(&path).map_err(io_err(&path))?;
        } else {
            continue;
        }
        stats.removed += 1;
    }

    Ok(stats)
}

fn same_contents(a: &Path, b: &Path) -> Result<bool, MirrorError> {
    if !b.is_file() {
        return Ok(false);
    }
    let meta_a = fs::metadata(a).map_err(io_err(a))?;
    let meta_b = fs::metadata(b).map_err(io_err(b))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(fs::read(a).map_err(io_err(a))? == fs::read(b).map_err(io_err(b))?)
}
