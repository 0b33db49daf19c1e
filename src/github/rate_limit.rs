//! Remaining-quota tracking per API category.
//!
//! GitHub accounts for `search` calls and general (`core`) calls in separate
//! budgets. The [`RateLimiter`] caches the remaining count per category,
//! refreshing it lazily through an explicit quota query whenever a budget is
//! unknown or exhausted, and overwriting it from the rate-limit header
//! observed on every response. A remaining count of zero is a signal, not a
//! block: callers decide how long to wait before rechecking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::gateway::IssueGateway;

/// API categories with independent call budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCategory {
    /// General REST calls (issue and comment listings).
    Core,
    /// Search endpoint calls (repository search, issue counts).
    Search,
}

impl ApiCategory {
    /// Returns the category name as used by the quota endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Search => "search",
        }
    }
}

/// Remaining call counts per category, as reported by the quota endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    /// Remaining general calls.
    pub core: u32,
    /// Remaining search calls.
    pub search: u32,
}

impl RateBudget {
    /// Returns the remaining count for one category.
    #[must_use]
    pub const fn get(self, category: ApiCategory) -> u32 {
        match category {
            ApiCategory::Core => self.core,
            ApiCategory::Search => self.search,
        }
    }
}

/// Per-category remaining-call cache.
///
/// Each budget is either unknown or known: unknown (or exhausted) budgets
/// are refreshed through the gateway's quota query; known positive budgets
/// are served from the cache. The cache is not persisted: it is rebuilt
/// lazily after a restart.
#[derive(Debug, Default)]
pub struct RateLimiter {
    budgets: HashMap<ApiCategory, u32>,
}

impl RateLimiter {
    /// Creates a limiter with no known budgets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remaining budget for `category`.
    ///
    /// Serves the cached value when it is known and positive; otherwise
    /// performs one quota query through the gateway and caches the result.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures from the quota query.
    pub async fn remaining<G>(
        &mut self,
        category: ApiCategory,
        gateway: &G,
    ) -> Result<u32, ApiError>
    where
        G: IssueGateway + ?Sized,
    {
        if let Some(&cached) = self.budgets.get(&category)
            && cached > 0
        {
            tracing::debug!(category = category.as_str(), remaining = cached, "budget from cache");
            return Ok(cached);
        }

        let budget = gateway.quota().await?;
        let remaining = budget.get(category);
        self.budgets.insert(category, remaining);
        tracing::debug!(
            category = category.as_str(),
            remaining,
            "budget from quota query"
        );
        Ok(remaining)
    }

    /// Overwrites a category's budget with the value observed on the most
    /// recent response, when the response carried one.
    pub fn record(&mut self, category: ApiCategory, observed: Option<u32>) {
        if let Some(remaining) = observed {
            self.budgets.insert(category, remaining);
        }
    }
}
