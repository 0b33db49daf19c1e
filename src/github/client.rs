//! Authenticated paginated HTTP client for the GitHub REST API.
//!
//! The client builds request URLs deterministically from a path and an
//! ordered parameter set, issues one authenticated GET per logical call, and
//! extracts the pagination cursor and remaining-quota signal from the
//! response headers. Transport failures (timeouts, connection resets,
//! undecodable bodies, server errors) are retried indefinitely with a capped
//! exponential backoff; they never cross this boundary. Everything else is
//! propagated unmodified.

use std::time::Duration;

use http::StatusCode;
use http::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT};
use serde_json::Value;
use url::Url;

use super::error::ApiError;
use super::pagination;

/// Response header carrying the remaining-quota signal.
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Preview media type the original collection pipeline requested, kept so
/// reaction data rides along on issue records.
const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.squirrel-girl-preview";

/// Per-request timeout for a single GET attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Access token wrapper enforcing presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when the supplied string is blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, ApiError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ApiError::MissingToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

/// Retry delay policy for transport failures.
///
/// Retries are unlimited; the policy only bounds how long each wait can
/// grow. The delay doubles per attempt from `initial_delay` up to
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    const fn ladder(self) -> RetryDelays {
        RetryDelays {
            next: self.initial_delay,
            max: self.max_delay,
        }
    }
}

/// Iterator-like delay ladder derived from a [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
struct RetryDelays {
    next: Duration,
    max: Duration,
}

impl RetryDelays {
    fn advance(&mut self) -> Duration {
        let current = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        current
    }
}

/// Decoded response from one paginated GET.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Decoded JSON body.
    pub body: Value,
    /// Next page number parsed from the `Link` header, absent on the last
    /// page.
    pub next_page: Option<u32>,
    /// Remaining-quota signal parsed from the rate-limit header.
    pub remaining: Option<u32>,
}

/// Outcome of a single GET attempt, before retry classification.
enum AttemptFailure {
    /// Retry after a delay; the message is logged, not surfaced.
    Transient { message: String },
    /// Propagate to the caller unmodified.
    Fatal(ApiError),
}

/// Authenticated GitHub API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: Url,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Builds a client for the given API base, token, and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the base URL cannot be parsed
    /// and [`ApiError::Configuration`] when the headers or the underlying
    /// HTTP client cannot be constructed.
    pub fn new(
        api_base: &str,
        token: &AccessToken,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let base = normalise_base(api_base)?;
        let headers = default_headers(token, user_agent)?;

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ApiError::Configuration {
                message: format!("build HTTP client failed: {error}"),
            })?;

        Ok(Self {
            http,
            api_base: base,
            retry,
        })
    }

    /// Builds a request URL from an API path and an ordered parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the path does not join onto the
    /// configured API base.
    pub fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .api_base
            .join(path)
            .map_err(|error| ApiError::InvalidUrl(error.to_string()))?;
        append_params(&mut url, params);
        Ok(url)
    }

    /// Parses an absolute endpoint URL (as embedded in issue records) and
    /// appends an ordered parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the URL cannot be parsed.
    pub fn absolute_endpoint(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Url, ApiError> {
        let mut parsed = Url::parse(url).map_err(|error| ApiError::InvalidUrl(error.to_string()))?;
        append_params(&mut parsed, params);
        Ok(parsed)
    }

    /// Issues one authenticated GET, retrying transport failures until the
    /// request completes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] for 401/403 responses and
    /// [`ApiError::Api`] for other non-success statuses. Transport failures
    /// are retried internally and never surface.
    pub async fn fetch(&self, url: Url) -> Result<RawResponse, ApiError> {
        let mut delays = self.retry.ladder();
        loop {
            match self.attempt(url.clone()).await {
                Ok(response) => return Ok(response),
                Err(AttemptFailure::Fatal(error)) => return Err(error),
                Err(AttemptFailure::Transient { message }) => {
                    let delay = delays.advance();
                    tracing::warn!(%url, %message, ?delay, "transport failure, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, url: Url) -> Result<RawResponse, AttemptFailure> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| AttemptFailure::Transient {
                message: error.to_string(),
            })?;

        let status = response.status();
        let next_page = pagination::next_page(response.headers().get(LINK));
        let remaining = remaining_quota(response.headers());

        if status.is_server_error() {
            return Err(AttemptFailure::Transient {
                message: format!("GitHub returned {status}"),
            });
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Fatal(status_error(status, &detail)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| AttemptFailure::Transient {
                message: format!("response body undecodable: {error}"),
            })?;

        Ok(RawResponse {
            body,
            next_page,
            remaining,
        })
    }
}

/// Parses the remaining-quota signal from the rate-limit response header.
fn remaining_quota(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(RATE_LIMIT_REMAINING)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u32>().ok())
}

/// Maps a non-success HTTP status onto the caller-facing error taxonomy.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = github_message(body)
        .unwrap_or_else(|| format!("GitHub returned {status}"));

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiError::Authentication {
            message: format!("{status}: {message}"),
        }
    } else {
        ApiError::Api {
            message: format!("{status}: {message}"),
        }
    }
}

/// Extracts the `message` field from a GitHub error body.
fn github_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Normalises the API base so relative paths join beneath it.
fn normalise_base(api_base: &str) -> Result<Url, ApiError> {
    let mut base = api_base.trim().to_owned();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base).map_err(|error| ApiError::InvalidUrl(error.to_string()))
}

fn append_params(url: &mut Url, params: &[(&str, String)]) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (name, value) in params {
        pairs.append_pair(name, value);
    }
}

fn default_headers(token: &AccessToken, user_agent: &str) -> Result<HeaderMap, ApiError> {
    let configuration = |error: http::header::InvalidHeaderValue| ApiError::Configuration {
        message: format!("invalid header value: {error}"),
    };

    let mut authorization = HeaderValue::from_str(&format!("token {}", token.value()))
        .map_err(configuration)?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(configuration)?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
    Ok(headers)
}
