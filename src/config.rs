//! Harvest configuration merged from CLI, environment, and files.
//!
//! One struct gathers every tunable, with ortho-config layering the
//! sources. Lowest to highest precedence: built-in defaults, then a
//! `.gleaner.toml` in the working directory, home directory, or XDG config
//! directory, then `GLEANER_*` environment variables (with the legacy
//! `GITHUB_TOKEN` as a token fallback), then command-line flags such as
//! `--token`/`-t` and `--repo-query`/`-q`.
//!
//! A typical `.gleaner.toml`:
//!
//! ```toml
//! token = "ghp_example"
//! repo_query = "language:javascript stars:>=10000"
//! since = "2015-01-01T00:00:00Z"
//! sample_percent = 25
//! database_url = "gleaner.sqlite"
//! checkpoint_path = "gleaner-checkpoint.json"
//! output_path = "issues.json"
//! ```

use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::github::error::ApiError;
use crate::github::gateway::HarvestFilter;
use crate::harvest::HarvestSettings;

/// Merged harvest configuration.
///
/// Every optional field has a built-in default; the accessor methods apply
/// them so callers never see the raw `Option`s.
///
/// # Example
///
/// ```no_run
/// use gleaner::GleanerConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = GleanerConfig::load().expect("failed to load configuration");
/// let token = config.resolve_token().expect("token required");
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "GLEANER",
    discovery(
        dotfile_name = ".gleaner.toml",
        config_file_name = "gleaner.toml",
        app_name = "gleaner"
    )
)]
pub struct GleanerConfig {
    /// Personal access token used to authenticate every API call.
    ///
    /// Sourced from `--token`/`-t`, `GLEANER_TOKEN`, the config file, or
    /// the legacy `GITHUB_TOKEN` environment variable.
    #[ortho_config(cli_short = 't')]
    pub token: Option<String>,

    /// Repository search qualifier selecting the repositories to harvest.
    ///
    /// Defaults to `language:javascript stars:>=10000`.
    #[ortho_config(cli_short = 'q')]
    pub repo_query: Option<String>,

    /// RFC 3339 lower bound on issue creation time.
    ///
    /// Defaults to `2015-01-01T00:00:00Z`.
    pub since: Option<String>,

    /// Share of each repository's closed issues to retain, in percent.
    ///
    /// Defaults to 25.
    pub sample_percent: Option<u8>,

    /// Items requested per page on every listing endpoint.
    ///
    /// Defaults to 100, the GitHub maximum.
    pub per_page: Option<u8>,

    /// Base URL of the GitHub API.
    ///
    /// Defaults to `https://api.github.com`; point it at a GitHub Enterprise
    /// host when harvesting from one.
    pub api_base: Option<String>,

    /// User-Agent header sent with every request.
    pub user_agent: Option<String>,

    /// Path of the local sqlite database holding collected documents.
    ///
    /// Diesel opens sqlite connections from a filesystem path; the Diesel
    /// CLI reads the same value through `DATABASE_URL`.
    pub database_url: Option<String>,

    /// Path of the JSON checkpoint file.
    ///
    /// Defaults to `gleaner-checkpoint.json` in the working directory.
    pub checkpoint_path: Option<String>,

    /// Path of the final JSON export.
    ///
    /// Defaults to `issues.json` in the working directory.
    pub output_path: Option<String>,

    /// Seconds to wait between quota rechecks once a budget is exhausted.
    ///
    /// Defaults to 30.
    pub quota_wait_seconds: Option<u64>,

    /// Skip issues created after the per-repository count snapshot.
    ///
    /// Defaults to true; disable to admit late arrivals into the stream.
    pub skip_above_snapshot: Option<bool>,

    /// Apply database migrations and exit.
    ///
    /// When set, Gleaner creates or upgrades the database at `database_url`,
    /// reports the schema version through telemetry, and exits without
    /// touching GitHub.
    pub migrate_db: bool,
}

impl GleanerConfig {
    /// Resolves the access token, falling back to the legacy `GITHUB_TOKEN`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when no source supplies a token.
    pub fn resolve_token(&self) -> Result<String, ApiError> {
        self.token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .ok_or(ApiError::MissingToken)
    }

    /// Returns the API base URL, defaulted to the public GitHub API.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or("https://api.github.com")
    }

    /// Returns the User-Agent header value.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("gleaner-harvester")
    }

    /// Returns the sqlite database URL/path.
    #[must_use]
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or("gleaner.sqlite")
    }

    /// Returns the checkpoint file path.
    #[must_use]
    pub fn checkpoint_path(&self) -> &str {
        self.checkpoint_path
            .as_deref()
            .unwrap_or("gleaner-checkpoint.json")
    }

    /// Returns the JSON export path.
    #[must_use]
    pub fn output_path(&self) -> &str {
        self.output_path.as_deref().unwrap_or("issues.json")
    }

    /// Builds the harvest filter from the configured query, window, and page
    /// size.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when `since` is not a valid
    /// RFC 3339 timestamp.
    pub fn harvest_filter(&self) -> Result<HarvestFilter, ApiError> {
        let mut filter = HarvestFilter::default();
        if let Some(query) = &self.repo_query {
            filter.repo_query.clone_from(query);
        }
        if let Some(since) = &self.since {
            filter.since = DateTime::parse_from_rfc3339(since)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| ApiError::Configuration {
                    message: format!("since must be an RFC 3339 timestamp: {error}"),
                })?;
        }
        if let Some(per_page) = self.per_page {
            filter.per_page = per_page;
        }
        Ok(filter)
    }

    /// Builds the harvester settings from the configured sampling and quota
    /// parameters.
    #[must_use]
    pub fn settings(&self) -> HarvestSettings {
        let defaults = HarvestSettings::default();
        HarvestSettings {
            sample_percent: self.sample_percent.unwrap_or(defaults.sample_percent),
            quota_wait: self
                .quota_wait_seconds
                .map_or(defaults.quota_wait, Duration::from_secs),
            skip_above_snapshot: self
                .skip_above_snapshot
                .unwrap_or(defaults.skip_above_snapshot),
        }
    }
}
