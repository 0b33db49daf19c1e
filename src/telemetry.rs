//! Application telemetry events and sinks.
//!
//! Gleaner is a local tool, but long harvests benefit from lightweight
//! telemetry: schema versions, checkpoint restores, and run restarts are
//! the signals needed to reconstruct what a multi-day collection did.

use std::io;

use serde::{Deserialize, Serialize};

/// A structured telemetry event emitted by Gleaner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Records the current database schema version after migrations apply.
    SchemaVersionRecorded {
        /// Diesel migration version string (e.g. `20260301000000`).
        schema_version: String,
    },
    /// A saved checkpoint was restored at startup.
    CheckpointRestored {
        /// Repository the restored run was traversing.
        repo: String,
        /// Issue-listing page the restored run had reached.
        issues_page: u32,
    },
    /// A failed run was restarted from its checkpoint.
    RunRestarted {
        /// Failure that triggered the restart.
        reason: String,
    },
    /// A harvest run finished with its repository listing exhausted.
    HarvestCompleted {
        /// Total documents in the store at completion.
        collected: u64,
    },
}

/// Destination for telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Records one event.
    fn record(&self, event: TelemetryEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Sink writing each event to stderr as one JSON line.
///
/// Events stay on the local machine; nothing is transmitted anywhere.
#[derive(Debug, Default)]
pub struct StderrJsonlTelemetrySink;

impl TelemetrySink for StderrJsonlTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        let Ok(line) = serde_json::to_string(&event) else {
            return;
        };

        let _ignored = write_stderr_line(&line);
    }
}

fn write_stderr_line(line: &str) -> io::Result<()> {
    use io::Write;

    writeln!(io::stderr().lock(), "{line}")
}

/// Telemetry sink that retains events for later inspection.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    events: std::sync::Mutex<Vec<TelemetryEvent>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingTelemetrySink {
    /// Removes and returns every recorded event.
    #[must_use]
    pub fn take(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|mut events| events.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TelemetrySink for RecordingTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
