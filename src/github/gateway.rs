//! Gateways over the typed GitHub endpoints the harvester consumes.
//!
//! The trait-based design mirrors the rest of the crate's seams: the
//! [`IssueGateway`] trait enables mocking in orchestrator tests while
//! [`HttpIssueGateway`] performs real HTTP requests through the paginated
//! client.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::GithubClient;
use super::error::ApiError;
use super::models::{ApiIssue, CommentPage, IssueCount, IssuePage, RepoPage, RepoSummary};
use super::rate_limit::RateBudget;

/// Filters applied to every harvest traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestFilter {
    /// Repository search qualifier, e.g. `language:javascript stars:>=10000`.
    pub repo_query: String,
    /// Lower bound on issue creation time.
    pub since: DateTime<Utc>,
    /// Items requested per page, for every listing endpoint.
    pub per_page: u8,
}

impl Default for HarvestFilter {
    fn default() -> Self {
        Self {
            repo_query: "language:javascript stars:>=10000".to_owned(),
            // 2015-01-01T00:00:00Z
            since: DateTime::from_timestamp(1_420_070_400, 0).unwrap_or(DateTime::UNIX_EPOCH),
            per_page: 100,
        }
    }
}

impl HarvestFilter {
    fn since_param(&self) -> String {
        self.since.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Gateway over the endpoints driving the repo → issues → comments
/// traversal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueGateway: Send + Sync {
    /// Fetch one page of the repository search listing.
    async fn repository_page(&self, page: u32) -> Result<RepoPage, ApiError>;

    /// Count closed issues matching the harvest filter in one repository.
    async fn closed_issue_count(&self, repo: &str) -> Result<IssueCount, ApiError>;

    /// Fetch one page of a repository's closed-issue listing.
    async fn issue_page(&self, repo: &str, page: u32) -> Result<IssuePage, ApiError>;

    /// Fetch one page of an issue's comment listing.
    ///
    /// `comments_url` is the absolute endpoint URL embedded in the issue
    /// record.
    async fn comment_page(&self, comments_url: &str, page: u32) -> Result<CommentPage, ApiError>;

    /// Query the remaining call budgets per category.
    async fn quota(&self) -> Result<RateBudget, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ApiRepoSearch {
    total_count: u64,
    items: Vec<RepoSummary>,
}

#[derive(Debug, Deserialize)]
struct ApiIssueSearch {
    total_count: u64,
    items: Vec<ApiIssueStub>,
}

#[derive(Debug, Deserialize)]
struct ApiIssueStub {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ApiRateLimit {
    resources: ApiRateResources,
}

#[derive(Debug, Deserialize)]
struct ApiRateResources {
    core: ApiRateEntry,
    search: ApiRateEntry,
}

#[derive(Debug, Deserialize)]
struct ApiRateEntry {
    remaining: u32,
}

/// HTTP-backed gateway.
#[derive(Debug, Clone)]
pub struct HttpIssueGateway {
    client: GithubClient,
    filter: HarvestFilter,
}

impl HttpIssueGateway {
    /// Creates a gateway from a client and a harvest filter.
    #[must_use]
    pub const fn new(client: GithubClient, filter: HarvestFilter) -> Self {
        Self { client, filter }
    }
}

#[async_trait]
impl IssueGateway for HttpIssueGateway {
    async fn repository_page(&self, page: u32) -> Result<RepoPage, ApiError> {
        let url = self.client.endpoint(
            "search/repositories",
            &[
                ("q", self.filter.repo_query.clone()),
                ("sort", "stars".to_owned()),
                ("order", "desc".to_owned()),
                ("per_page", self.filter.per_page.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        let raw = self.client.fetch(url).await?;
        let search: ApiRepoSearch = decode(raw.body)?;
        Ok(RepoPage {
            total_count: search.total_count,
            items: search.items,
            next_page: raw.next_page,
            remaining: raw.remaining,
        })
    }

    async fn closed_issue_count(&self, repo: &str) -> Result<IssueCount, ApiError> {
        let query = format!(
            "type:issue state:closed created:>={since} repo:{repo}",
            since = self.filter.since_param()
        );
        let url = self.client.endpoint("search/issues", &[("q", query)])?;
        let raw = self.client.fetch(url).await?;
        let search: ApiIssueSearch = decode(raw.body)?;
        Ok(IssueCount {
            total: search.total_count,
            newest_issue_number: search.items.first().map(|stub| stub.number),
            remaining: raw.remaining,
        })
    }

    async fn issue_page(&self, repo: &str, page: u32) -> Result<IssuePage, ApiError> {
        let url = self.client.endpoint(
            &format!("repos/{repo}/issues"),
            &[
                ("state", "closed".to_owned()),
                ("sort", "created".to_owned()),
                ("direction", "desc".to_owned()),
                ("since", self.filter.since_param()),
                ("per_page", self.filter.per_page.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        let raw = self.client.fetch(url).await?;
        let items: Vec<ApiIssue> = decode(raw.body)?;
        Ok(IssuePage {
            items,
            next_page: raw.next_page,
            remaining: raw.remaining,
        })
    }

    async fn comment_page(&self, comments_url: &str, page: u32) -> Result<CommentPage, ApiError> {
        let url = self.client.absolute_endpoint(
            comments_url,
            &[
                ("per_page", self.filter.per_page.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        let raw = self.client.fetch(url).await?;
        let items: Vec<Value> = decode(raw.body)?;
        Ok(CommentPage {
            items,
            next_page: raw.next_page,
            remaining: raw.remaining,
        })
    }

    async fn quota(&self) -> Result<RateBudget, ApiError> {
        let url = self.client.endpoint("rate_limit", &[])?;
        let raw = self.client.fetch(url).await?;
        let limits: ApiRateLimit = decode(raw.body)?;
        Ok(RateBudget {
            core: limits.resources.core.remaining,
            search: limits.resources.search.remaining,
        })
    }
}

/// Decodes a well-formed JSON body into the expected endpoint shape.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|error| ApiError::UnexpectedPayload {
        message: error.to_string(),
    })
}
