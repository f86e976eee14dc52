//! Package Sync - propagate shared package directories to dependent repositories
//!
//! A source repository declares, in `blockera-pm.json` manifests, which of its
//! directories other repositories depend on. One run mirrors each declared
//! directory into every dependent repository on a reused sync branch, pushes,
//! and opens a pull request unless one is already open.
//!
//! # Modules
//!
//! - [`manifest`] - Manifest discovery and the target map
//! - [`target`] - Target resolution and authenticated URLs
//! - [`sync`] - Per-target state machine and the run loop
//! - [`git`] - Version-control capability (git CLI + gitoxide)
//! - [`review`] - Pull request capability (GitHub REST)
//! - [`mirror`] - Destructive directory mirroring
//! - [`report`] - Severity-tagged output
//! - [`config`] - Layered configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod mirror;
pub mod report;
pub mod review;
pub mod sync;
pub mod target;

pub use config::Config;
pub use error::{Error, Result};
pub use sync::{RunSummary, SyncOrchestrator, SyncRun, SyncState, TargetOutcome, TargetReport};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
