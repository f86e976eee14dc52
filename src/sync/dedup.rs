//! Pull request deduplication
//!
//! Listing failures are treated as "nothing open" so a flaky API never blocks
//! a sync; a real duplicate then fails at creation time instead.

use tracing::{debug, warn};

use crate::review::{PullRequest, ReviewApi};

/// Open pull requests on `owner/repo` whose title contains `title`
pub async fn find_open_sync_prs(
    api: &dyn ReviewApi,
    owner: &str,
    repo: &str,
    title: &str,
) -> Vec<PullRequest> {
    match api.list_open_pull_requests(owner, repo).await {
        Ok(pulls) => {
            let matching: Vec<PullRequest> = pulls
                .into_iter()
                .filter(|pr| pr.title.contains(title))
                .collect();
            debug!("{} open sync PR(s) on {}/{}", matching.len(), owner, repo);
            matching
        }
        Err(e) => {
            warn!("Could not list pull requests on {}/{}: {}", owner, repo, e);
            Vec::new()
        }
    }
}
