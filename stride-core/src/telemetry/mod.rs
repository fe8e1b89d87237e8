//! Telemetry event catalog and fixed-size history ring.
//!
//! The runtime records session lifecycle, detected steps and upload outcomes
//! here so the console `history` command and the log mirror can show what the
//! tracker did without keeping an unbounded log in memory.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::api::ApiError;
use crate::session::SessionEnd;
use crate::sync::{BatchNumber, UploadOutcome, UploadSkip, UploadTicket};

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    SessionStarted,
    SessionEnded(SessionEnd),
    SensorUnsupported,
    StepDetected,
    UploadStarted(BatchNumber),
    UploadAcknowledged(BatchNumber),
    UploadFailed(BatchNumber),
    UploadSkipped,
    ServerTotalApplied,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::SessionStarted => f.write_str("session-started"),
            TelemetryEventKind::SessionEnded(reason) => {
                let reason = match reason {
                    SessionEnd::Logout => "logout",
                    SessionEnd::Expired => "expired",
                    SessionEnd::Teardown => "teardown",
                };
                write!(f, "session-ended {reason}")
            }
            TelemetryEventKind::SensorUnsupported => f.write_str("sensor-unsupported"),
            TelemetryEventKind::StepDetected => f.write_str("step"),
            TelemetryEventKind::UploadStarted(batch) => write!(f, "upload-started #{batch}"),
            TelemetryEventKind::UploadAcknowledged(batch) => write!(f, "upload-acked #{batch}"),
            TelemetryEventKind::UploadFailed(batch) => write!(f, "upload-failed #{batch}"),
            TelemetryEventKind::UploadSkipped => f.write_str("upload-skipped"),
            TelemetryEventKind::ServerTotalApplied => f.write_str("server-total"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    /// Counter values after the event.
    Counters(CounterTelemetry),
    /// Upload ticket details.
    Upload(UploadTelemetry),
    /// Why a tick did nothing.
    Skip(UploadSkip),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Counters(counters) => {
                write!(f, "display={} pending={}", counters.display, counters.pending)
            }
            TelemetryPayload::Upload(upload) => {
                write!(f, "steps={} pending={}", upload.steps, upload.pending_after)?;
                if let Some(elapsed) = upload.round_trip {
                    write!(f, " rtt={}ms", elapsed.as_millis())?;
                }
                if let Some(error) = upload.error {
                    write!(f, " error=\"{error}\"")?;
                }
                Ok(())
            }
            TelemetryPayload::Skip(reason) => write!(f, "reason=\"{reason}\""),
        }
    }
}

/// Display and pending counters captured with an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CounterTelemetry {
    pub display: u32,
    pub pending: u32,
}

impl CounterTelemetry {
    #[must_use]
    pub const fn new(display: u32, pending: u32) -> Self {
        Self { display, pending }
    }
}

/// Upload attempt details.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UploadTelemetry {
    pub steps: u32,
    pub pending_after: u32,
    pub round_trip: Option<Duration>,
    pub error: Option<ApiError>,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    upload_started_at: Option<(BatchNumber, TInstant)>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            upload_started_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a detected step with the counters it produced.
    pub fn record_step(&mut self, display: u32, pending: u32, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::StepDetected,
            TelemetryPayload::Counters(CounterTelemetry::new(display, pending)),
            timestamp,
        )
    }

    /// Records a ticket leaving for the server and remembers when it left.
    pub fn record_upload_started(&mut self, ticket: UploadTicket, timestamp: TInstant) -> EventId {
        self.upload_started_at = Some((ticket.batch, timestamp));
        self.record(
            TelemetryEventKind::UploadStarted(ticket.batch),
            TelemetryPayload::Upload(UploadTelemetry {
                steps: ticket.steps,
                pending_after: ticket.steps,
                round_trip: None,
                error: None,
            }),
            timestamp,
        )
    }

    /// Records how a ticket finished, with the round trip when its start was seen.
    ///
    /// Stale outcomes are not recorded.
    pub fn record_upload_outcome(
        &mut self,
        ticket: UploadTicket,
        outcome: UploadOutcome,
        timestamp: TInstant,
    ) -> Option<EventId> {
        let round_trip = match self.upload_started_at.take() {
            Some((batch, started)) if batch == ticket.batch => {
                Some(timestamp.saturating_duration_since(started))
            }
            _ => None,
        };

        let (event, pending_after, error) = match outcome {
            UploadOutcome::Acknowledged { remaining, .. } => (
                TelemetryEventKind::UploadAcknowledged(ticket.batch),
                remaining,
                None,
            ),
            UploadOutcome::Retained { pending, error } => (
                TelemetryEventKind::UploadFailed(ticket.batch),
                pending,
                Some(error),
            ),
            UploadOutcome::Stale => return None,
        };

        Some(self.record(
            event,
            TelemetryPayload::Upload(UploadTelemetry {
                steps: ticket.steps,
                pending_after,
                round_trip,
                error,
            }),
            timestamp,
        ))
    }

    /// Records an upload tick that did not send anything.
    pub fn record_upload_skipped(&mut self, reason: UploadSkip, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::UploadSkipped,
            TelemetryPayload::Skip(reason),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncBuffer;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MillisInstant(u64);

    impl TelemetryInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn upload_round_trip_is_measured_from_start() {
        let mut recorder = TelemetryRecorder::<MillisInstant>::new();
        let mut buffer = SyncBuffer::new();
        buffer.record_step();
        buffer.record_step();

        let (ticket, ()) = buffer.begin_upload(Some(())).unwrap();
        recorder.record_upload_started(ticket, MillisInstant(1_000));
        buffer.record_step();
        let outcome = buffer.complete(ticket, Ok(crate::sync::SyncAck));
        let id = recorder
            .record_upload_outcome(ticket, outcome, MillisInstant(1_240))
            .expect("outcome recorded");
        assert_eq!(id, 1);

        let record = recorder.latest().copied().unwrap();
        assert_eq!(record.event, TelemetryEventKind::UploadAcknowledged(1));
        match record.details {
            TelemetryPayload::Upload(details) => {
                assert_eq!(details.steps, 2);
                assert_eq!(details.pending_after, 1);
                assert_eq!(details.round_trip, Some(Duration::from_millis(240)));
                assert_eq!(details.error, None);
            }
            _ => panic!("expected upload payload"),
        }
    }

    #[test]
    fn failed_upload_keeps_error() {
        let mut recorder = TelemetryRecorder::<MillisInstant>::new();
        let ticket = UploadTicket { batch: 3, steps: 5 };
        let outcome = UploadOutcome::Retained {
            pending: 6,
            error: ApiError::Status(503),
        };

        recorder.record_upload_outcome(ticket, outcome, MillisInstant(10));

        let record = recorder.latest().copied().unwrap();
        assert_eq!(record.event, TelemetryEventKind::UploadFailed(3));
        match record.details {
            TelemetryPayload::Upload(details) => {
                assert_eq!(details.round_trip, None);
                assert_eq!(details.error, Some(ApiError::Status(503)));
            }
            _ => panic!("expected upload payload"),
        }
    }

    #[test]
    fn stale_outcome_is_not_recorded() {
        let mut recorder = TelemetryRecorder::<MillisInstant>::new();
        let ticket = UploadTicket { batch: 1, steps: 1 };

        assert_eq!(
            recorder.record_upload_outcome(ticket, UploadOutcome::Stale, MillisInstant(0)),
            None
        );
        assert!(recorder.is_empty());
    }

    #[test]
    fn ring_keeps_only_the_newest_records() {
        let mut recorder = TelemetryRecorder::<MillisInstant, 4>::new();
        for t in 0..10 {
            recorder.record_step(t, t, MillisInstant(u64::from(t)));
        }

        assert_eq!(recorder.len(), 4);
        let first = recorder.oldest_first().next().unwrap();
        assert_eq!(first.id, 6);
        assert_eq!(recorder.latest().unwrap().id, 9);
    }
}
