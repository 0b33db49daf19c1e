//! Run supervision: checkpointing on every exit and one automatic restart.
//!
//! The harvester reports progress through its state; this layer decides
//! what happens when a run stops. Every exit path saves a checkpoint first.
//! Unclassified failures earn one restart from the just-saved state;
//! interrupts and resource exhaustion end the process's run immediately.

use crate::github::IssueGateway;
use crate::harvest::checkpoint::CheckpointStore;
use crate::harvest::error::HarvestError;
use crate::harvest::harvester::Harvester;
use crate::harvest::sink::DocumentSink;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Runs the harvester to completion, checkpointing on every exit path and
/// restarting once after an unclassified failure.
///
/// # Errors
///
/// Returns the final [`HarvestError`] when the run (or its single restart)
/// fails, or a checkpoint error when the success-path save fails. A failed
/// checkpoint save on the failure path is logged and does not mask the run
/// error.
pub async fn run_to_completion<G, S>(
    harvester: &mut Harvester<'_, G, S>,
    checkpoints: &dyn CheckpointStore,
    telemetry: &dyn TelemetrySink,
) -> Result<(), HarvestError>
where
    G: IssueGateway + ?Sized,
    S: DocumentSink + ?Sized,
{
    let mut restarted = false;
    loop {
        match harvester.run().await {
            Ok(()) => {
                harvester.state_mut().interrupted = false;
                checkpoints.save(harvester.state())?;
                return Ok(());
            }
            Err(error) => {
                harvester.state_mut().interrupted = true;
                if let Err(save_error) = checkpoints.save(harvester.state()) {
                    tracing::error!(%save_error, "failed to checkpoint after a run failure");
                }
                if error.is_interrupt() {
                    tracing::info!("run interrupted; checkpoint saved for a later resume");
                    return Err(error);
                }
                if error.is_fatal() || restarted {
                    tracing::error!(%error, "run failed without a restart");
                    return Err(error);
                }

                tracing::warn!(%error, "run failed; restarting once from the checkpoint");
                telemetry.record(TelemetryEvent::RunRestarted {
                    reason: error.to_string(),
                });
                restarted = true;
            }
        }
    }
}
