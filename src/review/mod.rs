//! Code-review host integration
//!
//! - `ReviewApi` - List and open pull requests
//! - `GitHubClient` - `ReviewApi` over the GitHub REST API

mod api;
mod github;

pub use api::*;
pub use github::*;
