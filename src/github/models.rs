//! Data models for repository search, issue listing, and comment listing.
//!
//! Issue and comment payloads are deliberately opaque: the harvester keeps
//! every field GitHub returns and only inspects the handful it needs to
//! drive traversal (the issue number, the comment count and URL, and the
//! pull-request marker). Opaque fields ride along in a flattened map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One repository from the repository-search listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoSummary {
    /// Owner-qualified repository name, e.g. `octocat/hello-world`.
    pub full_name: String,
}

/// One page of repository-search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPage {
    /// Total result count reported by the search endpoint.
    pub total_count: u64,
    /// Repositories on this page.
    pub items: Vec<RepoSummary>,
    /// Next page number when further pages exist.
    pub next_page: Option<u32>,
    /// Remaining quota observed on the response, when present.
    pub remaining: Option<u32>,
}

/// Result of the closed-issue count query for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueCount {
    /// Population size: closed issues matching the harvest filter.
    pub total: u64,
    /// Number of the newest matching issue, when any matched.
    ///
    /// Seeds the high-water mark so that issues created after this count
    /// snapshot can be recognised during the listing traversal.
    pub newest_issue_number: Option<u64>,
    /// Remaining quota observed on the response, when present.
    pub remaining: Option<u32>,
}

/// An issue as returned by the repository issue listing.
///
/// The listing endpoint returns pull requests interleaved with issues;
/// [`ApiIssue::is_pull_request`] distinguishes them via the `pull_request`
/// marker GitHub attaches to pull-request items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiIssue {
    /// Issue (or pull request) number.
    pub number: u64,
    /// Number of comments on the issue.
    #[serde(default)]
    pub comments: u64,
    /// Endpoint URL for listing this issue's comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_url: Option<String>,
    /// Present only on pull-request items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<Value>,
    /// Every other field of the API record, carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ApiIssue {
    /// Returns true when the listing item is a pull request.
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// One page of the issue listing for a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuePage {
    /// Issues (and pull requests) on this page, in API return order.
    pub items: Vec<ApiIssue>,
    /// Next page number when further pages exist.
    pub next_page: Option<u32>,
    /// Remaining quota observed on the response, when present.
    pub remaining: Option<u32>,
}

/// One page of the comment listing for an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    /// Opaque comment records, in API return order.
    pub items: Vec<Value>,
    /// Next page number when further pages exist.
    pub next_page: Option<u32>,
    /// Remaining quota observed on the response, when present.
    pub remaining: Option<u32>,
}

/// A sampled issue enriched with its full comment thread.
///
/// Created when the sampling planner selects an issue, enriched with the
/// comments collected across all comment pages, then handed to the document
/// sink and never mutated again.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    /// Repository the issue belongs to.
    pub repo: String,
    /// The issue as returned by the listing endpoint.
    pub issue: ApiIssue,
    /// All comments for the issue, in API return order.
    pub comments: Vec<Value>,
}

impl IssueRecord {
    /// Renders the record as a single JSON document: the raw issue fields
    /// plus an `issue_comments` array.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the issue cannot be converted back
    /// into a JSON value, which would indicate a malformed flattened map.
    pub fn document(&self) -> Result<Value, serde_json::Error> {
        let mut document = serde_json::to_value(&self.issue)?;
        if let Value::Object(fields) = &mut document {
            fields.insert(
                "issue_comments".to_owned(),
                Value::Array(self.comments.clone()),
            );
        }
        Ok(document)
    }
}
