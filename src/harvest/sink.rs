//! Destination for harvested issue documents.
//!
//! The harvester only needs three things from its storage: append a
//! document, say how many documents exist, and hand the lot back for
//! export. The trait keeps the orchestrator independent of the SQLite
//! store and lets tests collect into memory.

use serde_json::Value;

use crate::github::models::IssueRecord;
use crate::persistence::PersistenceError;

/// Storage seam for harvested documents.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentSink: Send + Sync {
    /// Stores one sampled issue with its comments.
    ///
    /// Re-inserting an issue already present (same repository and number)
    /// must replace the stored document rather than duplicate it.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the document cannot be rendered
    /// or written.
    fn insert(&self, record: &IssueRecord) -> Result<(), PersistenceError>;

    /// Number of documents currently stored.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the store cannot be queried.
    fn collected_count(&self) -> Result<u64, PersistenceError>;

    /// All stored documents, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the store cannot be read.
    fn collected(&self) -> Result<Vec<Value>, PersistenceError>;
}

/// In-memory sink for tests and demos.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: std::sync::Mutex<Vec<Value>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl DocumentSink for MemorySink {
    fn insert(&self, record: &IssueRecord) -> Result<(), PersistenceError> {
        let document = record
            .document()
            .map_err(|error| PersistenceError::WriteFailed {
                message: error.to_string(),
            })?;
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| PersistenceError::WriteFailed {
                message: "memory sink poisoned".to_owned(),
            })?;
        documents.push(document);
        Ok(())
    }

    fn collected_count(&self) -> Result<u64, PersistenceError> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| PersistenceError::QueryFailed {
                message: "memory sink poisoned".to_owned(),
            })?;
        Ok(u64::try_from(documents.len()).unwrap_or(u64::MAX))
    }

    fn collected(&self) -> Result<Vec<Value>, PersistenceError> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| PersistenceError::QueryFailed {
                message: "memory sink poisoned".to_owned(),
            })?;
        Ok(documents.clone())
    }
}
