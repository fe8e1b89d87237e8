//! Session-scoped tracking state.
//!
//! A [`TrackingSession`] is created at login and dropped at logout, so the
//! detector's debounce timer, the pending buffer, and the display counter
//! cannot outlive the user that produced them. [`StepTracker`] is the single
//! owner the runtime wraps in a lock; every counter update goes through it.

pub mod status;

use crate::api::ApiError;
use crate::config::TrackerConfig;
use crate::motion::{MotionSample, SensorUnavailable, StepDetector, StepEvent, TimestampMillis};
use crate::sync::{BatchNumber, SyncAck, SyncBuffer, SyncStats, UploadOutcome, UploadSkip, UploadTicket};

pub use status::{SensorStatus, StatusFormatter, StatusSnapshot};

/// Coarse lifecycle state of the tracker.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrackerState {
    /// No session: nothing is sampled or uploaded.
    Unauthenticated,
    /// Sampling and buffering.
    Active,
    /// Session exists but the sensor is unavailable; uploads still run.
    BufferingOnly,
}

/// Why a session ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionEnd {
    /// User asked to log out.
    Logout,
    /// Server rejected the token.
    Expired,
    /// Runtime shut down.
    Teardown,
}

/// Counters owned by one authenticated session.
#[derive(Clone, Debug)]
pub struct TrackingSession {
    detector: StepDetector,
    buffer: SyncBuffer,
    display: u32,
    local_since_fetch: u32,
    server_total: Option<u32>,
    sensor: SensorStatus,
}

impl TrackingSession {
    fn new(config: &TrackerConfig, first_batch: BatchNumber) -> Self {
        Self {
            detector: StepDetector::new(config.detector),
            buffer: SyncBuffer::starting_at(first_batch),
            display: 0,
            local_since_fetch: 0,
            server_total: None,
            sensor: SensorStatus::Connecting,
        }
    }

    /// Steps shown to the user: last server total plus local detections since.
    #[must_use]
    pub const fn display(&self) -> u32 {
        self.display
    }

    /// Steps detected since the last server fetch.
    #[must_use]
    pub const fn local_since_fetch(&self) -> u32 {
        self.local_since_fetch
    }

    /// Total reported by the most recent home fetch, if any.
    #[must_use]
    pub const fn server_total(&self) -> Option<u32> {
        self.server_total
    }

    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.buffer.pending()
    }

    #[must_use]
    pub const fn sensor(&self) -> SensorStatus {
        self.sensor
    }

    #[must_use]
    pub const fn detector(&self) -> &StepDetector {
        &self.detector
    }

    fn apply_step(&mut self) {
        self.buffer.record_step();
        self.display = self.display.saturating_add(1);
        self.local_since_fetch = self.local_since_fetch.saturating_add(1);
    }
}

/// Owner of the optional session and the tracker configuration.
#[derive(Clone, Debug)]
pub struct StepTracker {
    config: TrackerConfig,
    session: Option<TrackingSession>,
    signed_out: SensorStatus,
    next_batch: BatchNumber,
}

impl StepTracker {
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            session: None,
            signed_out: SensorStatus::LoginRequired,
            next_batch: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn state(&self) -> TrackerState {
        match &self.session {
            None => TrackerState::Unauthenticated,
            Some(session) if session.sensor == SensorStatus::Unsupported => {
                TrackerState::BufferingOnly
            }
            Some(_) => TrackerState::Active,
        }
    }

    /// Opens a fresh session. Returns `false` when one is already open.
    pub fn start_session(&mut self) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.session = Some(TrackingSession::new(&self.config, self.next_batch));
        true
    }

    /// Records the outcome of subscribing to the motion sensor.
    pub fn sensor_started(&mut self, result: Result<(), SensorUnavailable>) -> TrackerState {
        if let Some(session) = self.session.as_mut() {
            session.sensor = match result {
                Ok(()) => SensorStatus::Active,
                Err(SensorUnavailable) => SensorStatus::Unsupported,
            };
        }
        self.state()
    }

    /// Drops the session and everything it buffered.
    ///
    /// Returns the pending steps that were discarded, or `None` when no
    /// session was open.
    pub fn end_session(&mut self, reason: SessionEnd) -> Option<u32> {
        self.signed_out = match reason {
            SessionEnd::Logout => SensorStatus::LoggedOut,
            SessionEnd::Expired | SessionEnd::Teardown => SensorStatus::LoginRequired,
        };
        let session = self.session.take()?;
        self.next_batch = session.buffer.next_batch();
        Some(session.pending())
    }

    /// Feeds one accelerometer sample through the detector.
    ///
    /// Samples arriving without a session, or while the sensor is flagged
    /// unsupported, are ignored.
    pub fn record_sample(
        &mut self,
        sample: &MotionSample,
        now_ms: TimestampMillis,
    ) -> Option<StepEvent> {
        let session = self.session.as_mut()?;
        if session.sensor == SensorStatus::Unsupported {
            return None;
        }
        let event = session.detector.process(sample, now_ms)?;
        session.apply_step();
        Some(event)
    }

    /// Snapshots pending steps for an upload.
    ///
    /// # Errors
    ///
    /// Returns the skip reason; without a session nothing is ever pending.
    pub fn begin_upload<C>(
        &mut self,
        credential: Option<C>,
    ) -> Result<(UploadTicket, C), UploadSkip> {
        match self.session.as_mut() {
            Some(session) => session.buffer.begin_upload(credential),
            None => Err(UploadSkip::NothingPending),
        }
    }

    /// Applies an upload result to the session that issued `ticket`.
    ///
    /// Batch numbers are unique across sessions, so a result for a ticket
    /// issued before a logout is [`UploadOutcome::Stale`] and leaves the
    /// current session's in-flight guard alone.
    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        result: Result<SyncAck, ApiError>,
    ) -> UploadOutcome {
        match self.session.as_mut() {
            Some(session) => session.buffer.complete(ticket, result),
            None => UploadOutcome::Stale,
        }
    }

    /// Replaces the display count with a fresh server total.
    ///
    /// This is the only path that may lower the display count. Local
    /// detections are counted again from zero afterwards.
    pub fn apply_server_total(&mut self, total: u32) -> Option<u32> {
        let session = self.session.as_mut()?;
        session.server_total = Some(total);
        session.display = total;
        session.local_since_fetch = 0;
        Some(total)
    }

    /// Steps shown to the user; zero without a session.
    #[must_use]
    pub fn display(&self) -> u32 {
        self.session.as_ref().map_or(0, TrackingSession::display)
    }

    /// Steps awaiting acknowledgement; zero without a session.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.session.as_ref().map_or(0, TrackingSession::pending)
    }

    #[must_use]
    pub fn sync_stats(&self) -> SyncStats {
        self.session
            .as_ref()
            .map(|session| session.buffer.stats())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        match &self.session {
            None => StatusSnapshot::signed_out(self.signed_out),
            Some(session) => StatusSnapshot {
                sensor: session.sensor,
                display: session.display,
                pending: session.buffer.pending(),
                in_flight: session.buffer.in_flight().map(|ticket| ticket.batch),
                sync: session.buffer.stats(),
            },
        }
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
