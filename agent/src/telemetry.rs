//! Telemetry ring bound to `embassy-time` instants, mirrored to `tracing`.

use core::time::Duration;

use embassy_time::Instant;
use stride_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryInstant, TelemetryRecord, TelemetryRecorder,
};
use tracing::{debug, info, warn};

/// Monotonic instant wrapper satisfying [`TelemetryInstant`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct AgentInstant(Instant);

impl AgentInstant {
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    /// Milliseconds elapsed since `epoch`.
    #[must_use]
    pub fn millis_since(self, epoch: Instant) -> u64 {
        self.0.saturating_duration_since(epoch).as_millis()
    }
}

impl From<Instant> for AgentInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for AgentInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

pub type AgentRecord = TelemetryRecord<AgentInstant>;

/// Recorder used by the runtime.
pub type AgentTelemetry = TelemetryRecorder<AgentInstant>;

/// Emits a `tracing` line for a freshly recorded event.
pub(crate) fn mirror(record: &AgentRecord, epoch: Instant) {
    let at_ms = record.timestamp.millis_since(epoch);
    let id: EventId = record.id;
    match record.event {
        TelemetryEventKind::StepDetected | TelemetryEventKind::UploadSkipped => {
            debug!(id, at_ms, event = %record.event, details = %record.details);
        }
        TelemetryEventKind::UploadFailed(_) | TelemetryEventKind::SensorUnsupported => {
            warn!(id, at_ms, event = %record.event, details = %record.details);
        }
        _ => info!(id, at_ms, event = %record.event, details = %record.details),
    }
}
