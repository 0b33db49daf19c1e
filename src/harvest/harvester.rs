//! The harvest orchestrator.
//!
//! Walks the repository search listing page by page, and for each repository
//! counts the matching closed issues, draws a sampling plan, then streams
//! the issue listing retaining only the planned positions. Sampled issues
//! are enriched with their full comment thread before being handed to the
//! document sink. All traversal cursors live in an owned [`HarvestState`]
//! so a run can stop after any page and resume from a checkpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::github::models::{ApiIssue, IssuePage, IssueRecord, RepoPage};
use crate::github::rate_limit::{ApiCategory, RateLimiter};
use crate::github::{ApiError, IssueGateway};
use crate::harvest::error::HarvestError;
use crate::harvest::sampling;
use crate::harvest::sink::DocumentSink;
use crate::harvest::state::HarvestState;

/// Tunable harvest behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Share of each repository's closed issues to retain, in percent.
    pub sample_percent: u8,
    /// Pause between quota checks once a budget is exhausted.
    pub quota_wait: Duration,
    /// Skip issues numbered above the count snapshot's newest issue.
    ///
    /// Such issues were created after the population was counted; admitting
    /// them would bias the sample towards the newest issues.
    pub skip_above_snapshot: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            sample_percent: 25,
            quota_wait: Duration::from_secs(30),
            skip_above_snapshot: true,
        }
    }
}

/// Drives one harvest traversal against a gateway and a sink.
pub struct Harvester<'deps, G, S>
where
    G: IssueGateway + ?Sized,
    S: DocumentSink + ?Sized,
{
    gateway: &'deps G,
    sink: &'deps S,
    limiter: RateLimiter,
    settings: HarvestSettings,
    state: HarvestState,
    interrupt: Arc<AtomicBool>,
}

impl<'deps, G, S> Harvester<'deps, G, S>
where
    G: IssueGateway + ?Sized,
    S: DocumentSink + ?Sized,
{
    /// Creates a harvester starting from a fresh state.
    #[must_use]
    pub fn new(
        gateway: &'deps G,
        sink: &'deps S,
        settings: HarvestSettings,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self::with_state(gateway, sink, settings, interrupt, HarvestState::new())
    }

    /// Creates a harvester resuming from a previously saved state.
    #[must_use]
    pub fn with_state(
        gateway: &'deps G,
        sink: &'deps S,
        settings: HarvestSettings,
        interrupt: Arc<AtomicBool>,
        state: HarvestState,
    ) -> Self {
        Self {
            gateway,
            sink,
            limiter: RateLimiter::new(),
            settings,
            state,
            interrupt,
        }
    }

    /// Returns the current traversal state.
    #[must_use]
    pub const fn state(&self) -> &HarvestState {
        &self.state
    }

    /// Returns the current traversal state for mutation.
    pub const fn state_mut(&mut self) -> &mut HarvestState {
        &mut self.state
    }

    /// Runs the traversal until the repository listing is exhausted.
    ///
    /// When the state carries the interrupted flag, the run first skips
    /// repositories on the current page until it reaches the one recorded in
    /// the state, then resumes its issue listing mid-stream with the saved
    /// sampling plan.
    ///
    /// # Errors
    ///
    /// Returns a [`HarvestError`] on gateway or sink failures, when an
    /// external interrupt is observed, or when comment buffers cannot be
    /// allocated. The state reflects progress up to the failure and can be
    /// checkpointed as-is.
    pub async fn run(&mut self) -> Result<(), HarvestError> {
        loop {
            self.check_interrupt()?;
            self.gate(ApiCategory::Search).await?;
            let page = self.gateway.repository_page(self.state.repos_page).await?;
            self.limiter.record(ApiCategory::Search, page.remaining);
            let RepoPage {
                items, next_page, ..
            } = page;
            tracing::info!(
                page = self.state.repos_page,
                repositories = items.len(),
                "repository page loaded"
            );

            for repo in &items {
                self.visit_repository(&repo.full_name).await?;
            }

            match next_page {
                Some(next) => self.state.repos_page = next,
                None => return Ok(()),
            }
        }
    }

    /// Handles one repository from the search listing, honouring an
    /// in-progress resume.
    async fn visit_repository(&mut self, repo: &str) -> Result<(), HarvestError> {
        if self.state.interrupted {
            if repo != self.state.repo_name {
                tracing::debug!(repo, "skipping repository already visited before the restart");
                return Ok(());
            }
            self.state.interrupted = false;
            tracing::info!(
                repo,
                issues_page = self.state.issues_page,
                collected = self.state.collected_items,
                "resuming repository mid-stream"
            );
            return self.stream_issues(repo).await;
        }

        self.state.begin_repository(repo);
        if self.prepare_repository(repo).await? {
            self.stream_issues(repo).await?;
        }
        Ok(())
    }

    /// Counts the population and draws the sampling plan for one repository.
    ///
    /// Returns false when the repository should be skipped outright: no
    /// matching closed issues, or a rounded sample target of zero.
    async fn prepare_repository(&mut self, repo: &str) -> Result<bool, HarvestError> {
        self.gate(ApiCategory::Search).await?;
        let count = self.gateway.closed_issue_count(repo).await?;
        self.limiter.record(ApiCategory::Search, count.remaining);

        if count.total == 0 {
            tracing::info!(repo, "no closed issues match the filter; skipping");
            return Ok(false);
        }

        let drawn = sampling::plan(count.total, self.settings.sample_percent);
        if drawn.target == 0 {
            tracing::info!(
                repo,
                population = count.total,
                "rounded sample target is zero; skipping"
            );
            return Ok(false);
        }

        self.state.repo_sample = drawn.positions;
        self.state.total_issues = count.total;
        self.state.collect_total = drawn.target;
        if self.settings.skip_above_snapshot {
            self.state.issue_number = count.newest_issue_number.unwrap_or(0);
        }
        tracing::info!(
            repo,
            population = count.total,
            target = drawn.target,
            "sampling plan drawn"
        );
        Ok(true)
    }

    /// Streams one repository's issue listing, collecting sampled issues,
    /// until the retention target is met or the listing is exhausted.
    async fn stream_issues(&mut self, repo: &str) -> Result<(), HarvestError> {
        while !self.state.target_met() {
            self.check_interrupt()?;
            self.gate(ApiCategory::Core).await?;
            let page = self.gateway.issue_page(repo, self.state.issues_page).await?;
            self.limiter.record(ApiCategory::Core, page.remaining);
            let IssuePage {
                items, next_page, ..
            } = page;

            for issue in items {
                if self.state.target_met() {
                    break;
                }
                self.consider_issue(repo, issue).await?;
            }

            match next_page {
                Some(next) => self.state.issues_page = next,
                None => break,
            }
        }
        tracing::info!(
            repo,
            collected = self.state.collected_items,
            target = self.state.collect_total,
            "repository finished"
        );
        Ok(())
    }

    /// Classifies one listing item and collects it when its rank is in the
    /// sampling plan.
    ///
    /// Pull requests and issues created after the count snapshot sit outside
    /// the sample frame and do not consume a rank.
    async fn consider_issue(&mut self, repo: &str, issue: ApiIssue) -> Result<(), HarvestError> {
        if issue.is_pull_request() {
            return Ok(());
        }
        if self.outside_snapshot(issue.number) {
            tracing::debug!(
                repo,
                number = issue.number,
                "issue newer than the count snapshot; skipped"
            );
            return Ok(());
        }

        let rank = self.state.current_index;
        self.state.issue_number = self.state.issue_number.max(issue.number);

        if !self.state.repo_sample.contains(&rank) {
            self.state.current_index += 1;
            return Ok(());
        }

        // The rank advances only once the sampled issue is safely stored:
        // a failure mid-collection leaves the rank unconsumed, so a resumed
        // run assigns it again instead of losing the sample slot.
        let record = self.collect_issue(repo, issue).await?;
        self.sink.insert(&record)?;
        self.state.current_index += 1;
        self.state.collected_items += 1;
        tracing::debug!(
            repo,
            number = record.issue.number,
            collected = self.state.collected_items,
            "issue collected"
        );
        Ok(())
    }

    /// Enriches a sampled issue with its full comment thread.
    async fn collect_issue(
        &mut self,
        repo: &str,
        issue: ApiIssue,
    ) -> Result<IssueRecord, HarvestError> {
        let comments = if issue.comments > 0 {
            let url = issue
                .comments_url
                .clone()
                .ok_or_else(|| ApiError::UnexpectedPayload {
                    message: format!("issue {} has comments but no comments_url", issue.number),
                })?;
            self.stream_comments(&url).await?
        } else {
            Vec::new()
        };
        Ok(IssueRecord {
            repo: repo.to_owned(),
            issue,
            comments,
        })
    }

    /// Collects every page of one issue's comment listing.
    async fn stream_comments(&mut self, comments_url: &str) -> Result<Vec<Value>, HarvestError> {
        self.state.comments_page = 1;
        let mut comments: Vec<Value> = Vec::new();
        loop {
            self.check_interrupt()?;
            self.gate(ApiCategory::Core).await?;
            let page = self
                .gateway
                .comment_page(comments_url, self.state.comments_page)
                .await?;
            self.limiter.record(ApiCategory::Core, page.remaining);

            comments
                .try_reserve(page.items.len())
                .map_err(|error| HarvestError::ResourceExhausted {
                    message: error.to_string(),
                })?;
            comments.extend(page.items);

            match page.next_page {
                Some(next) => self.state.comments_page = next,
                None => return Ok(comments),
            }
        }
    }

    /// Blocks until the category has remaining quota, rechecking on a fixed
    /// cadence while it is exhausted.
    async fn gate(&mut self, category: ApiCategory) -> Result<(), HarvestError> {
        loop {
            let remaining = self.limiter.remaining(category, self.gateway).await?;
            if remaining > 0 {
                return Ok(());
            }
            self.check_interrupt()?;
            tracing::warn!(
                category = category.as_str(),
                wait_secs = self.settings.quota_wait.as_secs(),
                "quota exhausted; waiting before rechecking"
            );
            tokio::time::sleep(self.settings.quota_wait).await;
        }
    }

    fn outside_snapshot(&self, number: u64) -> bool {
        self.settings.skip_above_snapshot
            && self.state.issue_number > 0
            && number > self.state.issue_number
    }

    fn check_interrupt(&self) -> Result<(), HarvestError> {
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(HarvestError::Interrupted);
        }
        Ok(())
    }
}
