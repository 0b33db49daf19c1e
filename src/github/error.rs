//! Error types exposed by the GitHub harvesting layer.

use thiserror::Error;

/// Errors surfaced while configuring or communicating with GitHub.
///
/// Transport-level failures (timeouts, resets, undecodable bodies) never
/// appear here: the client retries them internally until the request
/// succeeds. Every variant below is a condition the caller must handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The authentication token was missing.
    #[error("access token is required")]
    MissingToken,

    /// Configuration could not be loaded or was inconsistent.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// A request URL could not be constructed.
    #[error("request URL is invalid: {0}")]
    InvalidUrl(String),

    /// The token was rejected by GitHub.
    #[error("GitHub rejected the request: {message}")]
    Authentication {
        /// GitHub error detail returned with the 401/403 response.
        message: String,
    },

    /// GitHub returned a non-authentication API error.
    #[error("GitHub API error: {message}")]
    Api {
        /// Response detail from GitHub describing the failure.
        message: String,
    },

    /// The response decoded as JSON but did not match the expected shape.
    #[error("unexpected GitHub payload: {message}")]
    UnexpectedPayload {
        /// Description of the mismatch.
        message: String,
    },
}
