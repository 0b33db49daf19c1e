//! Error taxonomy for harvest runs.

use thiserror::Error;

use crate::github::ApiError;
use crate::harvest::checkpoint::CheckpointError;
use crate::persistence::PersistenceError;

/// Errors surfaced while running the harvester.
///
/// The runner classifies these on exit: interrupts and fatal resource
/// exhaustion end the run after a checkpoint save, while everything else is
/// eligible for one automatic restart from the saved checkpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarvestError {
    /// A GitHub call failed in a way the client does not retry.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The document store rejected a write or query.
    #[error(transparent)]
    Store(#[from] PersistenceError),

    /// The checkpoint could not be saved or loaded.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// An external interrupt requested a stop after the current page.
    #[error("harvest interrupted")]
    Interrupted,

    /// Memory could not be allocated for collected data.
    #[error("resource exhaustion: {message}")]
    ResourceExhausted {
        /// Allocation failure detail.
        message: String,
    },

    /// Writing the final export failed.
    #[error("I/O failed: {message}")]
    Io {
        /// Underlying I/O failure detail.
        message: String,
    },
}

impl HarvestError {
    /// Returns true for failures that must abort the run without a restart.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Returns true when the run stopped on an external interrupt.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
