//! Status surface shown to the user.
//!
//! [`StatusFormatter`] keeps the one-line rendering
//! (`<sensor> | today: <display> | pending: <pending>`) identical across the
//! agent logs and the console front-end.

use core::fmt;

use crate::sync::{BatchNumber, SyncStats};

/// Sensor / session state as presented to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorStatus {
    /// No session; the user must authenticate first.
    LoginRequired,
    /// Session started, sensor subscription not yet confirmed.
    Connecting,
    /// Accelerometer is delivering samples.
    Active,
    /// Platform has no motion sensor; steps can only come from elsewhere.
    Unsupported,
    /// User explicitly ended the session.
    LoggedOut,
}

impl SensorStatus {
    /// Returns `true` while a session exists.
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(
            self,
            SensorStatus::Connecting | SensorStatus::Active | SensorStatus::Unsupported
        )
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SensorStatus::LoginRequired => "login required",
            SensorStatus::Connecting => "connecting sensor...",
            SensorStatus::Active => "accelerometer active",
            SensorStatus::Unsupported => "sensor unsupported",
            SensorStatus::LoggedOut => "logged out",
        })
    }
}

/// Point-in-time copy of the tracker counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub sensor: SensorStatus,
    pub display: u32,
    pub pending: u32,
    pub in_flight: Option<BatchNumber>,
    pub sync: SyncStats,
}

impl StatusSnapshot {
    /// Snapshot reported when no session exists.
    #[must_use]
    pub const fn signed_out(sensor: SensorStatus) -> Self {
        Self {
            sensor,
            display: 0,
            pending: 0,
            in_flight: None,
            sync: SyncStats {
                attempts: 0,
                acknowledged: 0,
                failures: 0,
                skipped: 0,
                steps_acknowledged: 0,
            },
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::signed_out(SensorStatus::LoginRequired)
    }
}

/// Renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the headline (e.g. `accelerometer active | today: 42 | pending: 3`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_status_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "{} | today: {} | pending: {}",
            self.snapshot.sensor, self.snapshot.display, self.snapshot.pending
        )
    }

    /// Writes the upload line (e.g. `sync attempts=3 acked=2 failed=1 skipped=5 in-flight=#4`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_sync_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let stats = &self.snapshot.sync;
        write!(
            writer,
            "sync attempts={} acked={} failed={} skipped={} steps-acked={} in-flight=",
            stats.attempts,
            stats.acknowledged,
            stats.failures,
            stats.skipped,
            stats.steps_acknowledged
        )?;
        match self.snapshot.in_flight {
            Some(batch) => write!(writer, "#{batch}"),
            None => writer.write_str("none"),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        StatusFormatter::new(self).write_status_line(f)
    }
}
