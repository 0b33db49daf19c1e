//! Durable checkpoint storage for harvest state.
//!
//! [`HarvestState`] itself carries no serialisation concerns; this module
//! owns the on-disk representation. The sampled-position set becomes a
//! sorted list in the stored record and is rebuilt into a set on load, so
//! the wire format stays stable regardless of the in-memory collection.

use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::HarvestState;

/// Failures while persisting or restoring a checkpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    /// Filesystem access failed.
    #[error("checkpoint I/O failed: {message}")]
    Io {
        /// Underlying I/O failure detail.
        message: String,
    },

    /// The state could not be rendered as JSON.
    #[error("checkpoint could not be serialised: {message}")]
    Serialise {
        /// Underlying serialisation failure detail.
        message: String,
    },

    /// The stored checkpoint is not valid JSON for the expected record.
    #[error("checkpoint could not be parsed: {message}")]
    Deserialise {
        /// Underlying parse failure detail.
        message: String,
    },
}

/// Stored form of [`HarvestState`].
///
/// Field for field the same as the state, except the sampled positions are
/// an explicitly sorted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointRecord {
    repos_page: u32,
    repo_name: String,
    issues_page: u32,
    comments_page: u32,
    issue_number: u64,
    repo_sample: Vec<u64>,
    total_issues: u64,
    collect_total: u64,
    collected_items: u64,
    current_index: u64,
    interrupted: bool,
}

impl From<&HarvestState> for CheckpointRecord {
    fn from(state: &HarvestState) -> Self {
        Self {
            repos_page: state.repos_page,
            repo_name: state.repo_name.clone(),
            issues_page: state.issues_page,
            comments_page: state.comments_page,
            issue_number: state.issue_number,
            repo_sample: state.repo_sample.iter().copied().collect(),
            total_issues: state.total_issues,
            collect_total: state.collect_total,
            collected_items: state.collected_items,
            current_index: state.current_index,
            interrupted: state.interrupted,
        }
    }
}

impl From<CheckpointRecord> for HarvestState {
    fn from(record: CheckpointRecord) -> Self {
        Self {
            repos_page: record.repos_page,
            repo_name: record.repo_name,
            issues_page: record.issues_page,
            comments_page: record.comments_page,
            issue_number: record.issue_number,
            repo_sample: record.repo_sample.into_iter().collect(),
            total_issues: record.total_issues,
            collect_total: record.collect_total,
            collected_items: record.collected_items,
            current_index: record.current_index,
            interrupted: record.interrupted,
        }
    }
}

/// Durable store for the harvest checkpoint.
#[cfg_attr(test, mockall::automock)]
pub trait CheckpointStore: Send + Sync {
    /// Persists the state, replacing any previous checkpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckpointError`] when the state cannot be serialised or
    /// written.
    fn save(&self, state: &HarvestState) -> Result<(), CheckpointError>;

    /// Restores the most recently saved state, if any exists.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckpointError`] when a stored checkpoint exists but
    /// cannot be read or parsed.
    fn load(&self) -> Result<Option<HarvestState>, CheckpointError>;
}

/// Checkpoint store backed by a single JSON file.
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: Utf8PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the checkpoint file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn staging_path(&self) -> Utf8PathBuf {
        let mut staged = self.path.clone().into_string();
        staged.push_str(".tmp");
        Utf8PathBuf::from(staged)
    }
}

fn io_error(error: &std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        message: error.to_string(),
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, state: &HarvestState) -> Result<(), CheckpointError> {
        let record = CheckpointRecord::from(state);
        let rendered =
            serde_json::to_vec_pretty(&record).map_err(|error| CheckpointError::Serialise {
                message: error.to_string(),
            })?;

        let staged = self.staging_path();
        fs::write(&staged, rendered).map_err(|error| io_error(&error))?;
        fs::rename(&staged, &self.path).map_err(|error| io_error(&error))?;
        tracing::debug!(path = %self.path, "checkpoint saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<HarvestState>, CheckpointError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&error)),
        };
        if contents.is_empty() {
            return Ok(None);
        }
        let record: CheckpointRecord =
            serde_json::from_slice(&contents).map_err(|error| CheckpointError::Deserialise {
                message: error.to_string(),
            })?;
        Ok(Some(record.into()))
    }
}
