//! Durable harvest state.
//!
//! One owned [`HarvestState`] value captures everything a run needs to pick
//! up where it stopped: traversal cursors, the sampling decisions for the
//! repository in flight, counters, and the interrupt flag. The orchestrator
//! threads this value explicitly; persistence is a separate concern handled
//! by the checkpoint store.

use std::collections::BTreeSet;

/// Snapshot of harvest progress.
///
/// The sampled positions for the current repository are kept as an ordered
/// set; the checkpoint layer converts them to and from a sorted list for
/// serialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestState {
    /// Current page of the repository search listing (1-based).
    pub repos_page: u32,
    /// Owner-qualified name of the repository being traversed.
    pub repo_name: String,
    /// Current page of that repository's issue listing (1-based).
    pub issues_page: u32,
    /// Current page of the in-flight issue's comment listing (1-based).
    pub comments_page: u32,
    /// High-water issue number: issues numbered above this were created
    /// after the population was counted and are excluded from the sample
    /// frame.
    pub issue_number: u64,
    /// Positions (0-based ranks in the listing) retained for the current
    /// repository.
    pub repo_sample: BTreeSet<u64>,
    /// Population size reported by the count query for the current
    /// repository.
    pub total_issues: u64,
    /// Number of issues to retain from the current repository.
    pub collect_total: u64,
    /// Issues retained from the current repository so far.
    pub collected_items: u64,
    /// Rank of the next issue in the current repository's listing.
    pub current_index: u64,
    /// True when the previous run stopped before finishing the current
    /// repository.
    pub interrupted: bool,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self {
            repos_page: 1,
            repo_name: String::new(),
            issues_page: 1,
            comments_page: 1,
            issue_number: 0,
            repo_sample: BTreeSet::new(),
            total_issues: 0,
            collect_total: 0,
            collected_items: 0,
            current_index: 0,
            interrupted: false,
        }
    }
}

impl HarvestState {
    /// Creates the initial state for a fresh harvest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the current repository's retention target is met.
    #[must_use]
    pub const fn target_met(&self) -> bool {
        self.collected_items >= self.collect_total
    }

    /// Resets the per-repository fields ahead of a new repository.
    pub fn begin_repository(&mut self, repo_name: &str) {
        self.repo_name = repo_name.to_owned();
        self.issues_page = 1;
        self.comments_page = 1;
        self.issue_number = 0;
        self.repo_sample.clear();
        self.total_issues = 0;
        self.collect_total = 0;
        self.collected_items = 0;
        self.current_index = 0;
    }
}
