//! Resumable, sampling issue harvest.
//!
//! The traversal is repository search → per-repository issue count →
//! sampling plan → issue listing → comment listings, with every cursor held
//! in an owned [`HarvestState`] value. The checkpoint store persists that
//! state across runs; the runner decides when a failed run restarts.

pub mod checkpoint;
pub mod error;
pub mod harvester;
pub mod runner;
pub mod sampling;
pub mod sink;
pub mod state;

pub use checkpoint::{CheckpointError, CheckpointStore, FileCheckpointStore};
pub use error::HarvestError;
pub use harvester::{HarvestSettings, Harvester};
pub use runner::run_to_completion;
pub use sampling::{SamplePlan, plan, plan_with_rng};
pub use sink::DocumentSink;
pub use state::HarvestState;

#[cfg(any(test, feature = "test-support"))]
pub use sink::MemorySink;

#[cfg(test)]
mod tests;
