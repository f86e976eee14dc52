//! Error types for package-sync
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for package-sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Review API error: {0}")]
    Review(#[from] ReviewError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Manifest discovery and parsing errors
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Cannot read manifest search root {path}: {reason}")]
    UnreadableRoot { path: PathBuf, reason: String },

    #[error("Cannot read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Git operations errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Git command failed: {command} - {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to run git: {0}")]
    Spawn(String),

    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    #[error("Gitoxide error: {0}")]
    Gix(String),
}

/// Code-review host (pull request API) errors
#[derive(Error, Debug)]
pub enum ReviewError {
    /// HTTP 422, typically "No commits between base and head"
    #[error("Pull request rejected as unprocessable: {message}")]
    Conflict { message: String },

    #[error("Review API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Review API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Directory mirroring errors
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Mirror source does not exist or is not a directory: {0}")]
    MissingSource(PathBuf),

    #[error("Mirror I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mirror task failed: {0}")]
    Join(String),

    #[error("Packages '{first}' and '{second}' overlap at {}", .destination.display())]
    DestinationConflict {
        destination: PathBuf,
        first: String,
        second: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Missing required configuration value '{0}'")]
    Missing(&'static str),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
