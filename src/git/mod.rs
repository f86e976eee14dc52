//! Git operations
//!
//! - `Vcs` - Capability trait the orchestrator drives, keyed by `WorkingCopy`
//! - `GitCli` - `Vcs` over the git binary
//! - `GitBackend` - Read-only gitoxide queries (refs, history)

mod backend;
mod cli;
mod vcs;

pub use backend::*;
pub use cli::*;
pub use vcs::*;
