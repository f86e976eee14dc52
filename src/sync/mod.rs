//! Synchronization of shared packages into dependent repositories
//!
//! - `conventions` - Branch, title and message naming per source repository
//! - `dedup` - Open pull request lookup
//! - `orchestrator` - Per-target state machine
//! - `run` - Pre-loop setup and the sequential per-target loop

mod conventions;
mod dedup;
mod orchestrator;
mod run;

pub use conventions::*;
pub use dedup::*;
pub use orchestrator::*;
pub use run::*;
