//! Pull request capability used by the sync orchestrator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// An existing pull request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Request body for opening a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// Pull request operations on the review host
#[async_trait]
pub trait ReviewApi: Send + Sync {
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, ReviewError>;

    /// Open a pull request; HTTP 422 surfaces as [`ReviewError::Conflict`]
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ReviewError>;
}
