//! GitHub REST implementation of [`ReviewApi`]

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{NewPullRequest, PullRequest, ReviewApi};
use crate::error::ReviewError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Open PRs fetched per listing request
const PAGE_SIZE: u32 = 100;

/// Upper bound on `Link: rel="next"` hops while listing
const MAX_PAGES: usize = 50;

/// Error payload returned by the GitHub API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    fn describe(&self) -> String {
        let details: Vec<&str> = self
            .errors
            .iter()
            .filter_map(|d| d.message.as_deref())
            .collect();
        if details.is_empty() {
            self.message.clone()
        } else {
            format!("{} ({})", self.message, details.join("; "))
        }
    }
}

/// Target of the `rel="next"` entry in a `Link` header, if any
fn next_page_url(headers: &header::HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().eq_ignore_ascii_case("rel=\"next\""));
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

/// GitHub pull request client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ReviewError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn pulls_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_url, owner, repo)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Map non-success responses onto [`ReviewError`]
    async fn check(response: Response) -> Result<Response, ReviewError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.describe())
            .unwrap_or(text);

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            Err(ReviewError::Conflict { message })
        } else {
            Err(ReviewError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ReviewApi for GitHubClient {
    #[instrument(skip(self))]
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, ReviewError> {
        let per_page = PAGE_SIZE.to_string();
        let first = self
            .authorized(self.http.get(self.pulls_url(owner, repo)))
            .query(&[("state", "open"), ("per_page", per_page.as_str())])
            .send()
            .await?;

        let mut response = Self::check(first).await?;
        let mut pulls: Vec<PullRequest> = Vec::new();
        for page in 1..=MAX_PAGES {
            let next = next_page_url(response.headers());
            let batch: Vec<PullRequest> = response.json().await?;
            pulls.extend(batch);

            let Some(next) = next else {
                break;
            };
            if page == MAX_PAGES {
                warn!("Stopped listing {}/{} after {} pages", owner, repo, MAX_PAGES);
                break;
            }
            let sent = self.authorized(self.http.get(next)).send().await?;
            response = Self::check(sent).await?;
        }

        debug!("{} open pull requests on {}/{}", pulls.len(), owner, repo);
        Ok(pulls)
    }

    #[instrument(skip(self, request), fields(head = %request.head, base = %request.base))]
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ReviewError> {
        let response = self
            .authorized(self.http.post(self.pulls_url(owner, repo)))
            .json(request)
            .send()
            .await?;

        let pull: PullRequest = Self::check(response).await?.json().await?;
        Ok(pull)
    }
}
