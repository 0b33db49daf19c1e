//! GitHub API access for the issue harvester.
//!
//! This module wraps `reqwest` with a paginated, rate-limit-aware client:
//! deterministic URL building, `Link` header cursor extraction, quota-header
//! tracking, and unlimited transport retries with a capped backoff. Typed
//! gateways expose the endpoints the harvester traverses, behind a trait so
//! orchestrator tests can run against a mock.

pub mod client;
pub mod error;
pub mod gateway;
pub mod models;
pub mod pagination;
pub mod rate_limit;

pub use client::{AccessToken, GithubClient, RetryPolicy};
pub use error::ApiError;
pub use gateway::{HarvestFilter, HttpIssueGateway, IssueGateway};
pub use models::{ApiIssue, CommentPage, IssueCount, IssuePage, IssueRecord, RepoPage, RepoSummary};
pub use rate_limit::{ApiCategory, RateBudget, RateLimiter};

#[cfg(test)]
pub use gateway::MockIssueGateway;
