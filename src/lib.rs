//! Gleaner library crate: a resumable, sampling GitHub issue harvester.
//!
//! Gleaner walks the repository search listing, counts the closed issues in
//! each repository, draws a fixed-size uniform sample, and collects the
//! sampled issues with their full comment threads into a local `SQLite`
//! store. Progress lives in a durable JSON checkpoint so a crash, an
//! interrupt, or an exhausted API quota never costs more than the page in
//! flight.

pub mod config;
pub mod github;
pub mod harvest;
pub mod persistence;
pub mod telemetry;

pub use config::GleanerConfig;
pub use github::{
    AccessToken, ApiError, GithubClient, HarvestFilter, HttpIssueGateway, IssueGateway,
    RetryPolicy,
};
pub use harvest::{
    CheckpointStore, DocumentSink, FileCheckpointStore, HarvestError, HarvestSettings,
    HarvestState, Harvester, run_to_completion,
};
pub use persistence::{IssueStore, PersistenceError, migrate_database};
pub use telemetry::{TelemetryEvent, TelemetrySink};
