//! Cooperative tracking runtime.
//!
//! [`Agent`] owns the [`StepTracker`] behind a blocking mutex and exposes a
//! command queue plus an event queue to whatever front-end drives it. Its
//! [`run`](Agent::run) future never completes: it waits for a login, races
//! the command, sample, and upload loops for the length of a session, and
//! starts over after logout.

use core::cell::RefCell;
use core::convert::TryFrom;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::{Duration, Instant};
use heapless::Vec;
use stride_core::api::ApiError;
use stride_core::config::TrackerConfig;
use stride_core::session::{StatusSnapshot, StepTracker};
use stride_core::sync::{UploadOutcome, UploadSkip, UploadTicket};
use stride_core::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryEventKind, TelemetryPayload};
use tracing::warn;

use crate::error::LoginError;
use crate::platform::HomeSummary;
use crate::telemetry::{AgentInstant, AgentRecord, AgentTelemetry, mirror};

mod commands;
mod sampler;
mod session;
mod uploader;

/// Commands buffered between the front-end and the runtime.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

/// Events buffered for the front-end before new ones are dropped.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Requests accepted by the runtime.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AgentCommand {
    Login { username: String, password: String },
    Logout,
    /// Run one upload attempt now instead of waiting for the next tick.
    SyncNow,
    /// Re-fetch the home dashboard.
    Refresh,
}

impl AgentCommand {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            AgentCommand::Login { .. } => "login",
            AgentCommand::Logout => "logout",
            AgentCommand::SyncNow => "sync",
            AgentCommand::Refresh => "refresh",
        }
    }
}

/// Result of one upload attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UploadReport {
    Skipped(UploadSkip),
    Finished {
        ticket: UploadTicket,
        outcome: UploadOutcome,
    },
}

/// Notifications published for the front-end.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AgentEvent {
    SessionStarted { resumed: bool },
    LoginFailed(LoginError),
    /// A command that needs a session arrived without one.
    NotLoggedIn(&'static str),
    SensorUnsupported,
    LoggedOut { discarded: u32 },
    SessionExpired { discarded: u32 },
    Upload(UploadReport),
    HomeRefreshed(HomeSummary),
    RefreshFailed(ApiError),
}

/// Session runtime shared between the executor and the front-end.
pub struct Agent<M: RawMutex> {
    config: TrackerConfig,
    epoch: Instant,
    tracker: Mutex<M, RefCell<StepTracker>>,
    telemetry: Mutex<M, RefCell<AgentTelemetry>>,
    home: Mutex<M, RefCell<Option<HomeSummary>>>,
    commands: Channel<M, AgentCommand, COMMAND_QUEUE_DEPTH>,
    events: Channel<M, AgentEvent, EVENT_QUEUE_DEPTH>,
}

impl<M: RawMutex> Agent<M> {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            epoch: Instant::now(),
            tracker: Mutex::new(RefCell::new(StepTracker::new(config))),
            telemetry: Mutex::new(RefCell::new(AgentTelemetry::new())),
            home: Mutex::new(RefCell::new(None)),
            commands: Channel::new(),
            events: Channel::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Queues a command without waiting.
    ///
    /// # Errors
    ///
    /// Hands the command back when the queue is full.
    pub fn try_submit(&self, command: AgentCommand) -> Result<(), AgentCommand> {
        self.commands
            .try_send(command)
            .map_err(|TrySendError::Full(command)| command)
    }

    /// Queues a command, waiting for room.
    pub async fn submit(&self, command: AgentCommand) {
        self.commands.send(command).await;
    }

    /// Takes the oldest unread event, if any.
    pub fn try_next_event(&self) -> Option<AgentEvent> {
        self.events.try_receive().ok()
    }

    /// Waits for the next event.
    pub async fn next_event(&self) -> AgentEvent {
        self.events.receive().await
    }

    /// Current counters and sensor state.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.with_tracker(|tracker| tracker.snapshot())
    }

    /// Dashboard from the most recent successful refresh in this session.
    #[must_use]
    pub fn home(&self) -> Option<HomeSummary> {
        self.home.lock(|home| home.borrow().clone())
    }

    /// Copies up to `count` of the newest telemetry records, oldest first.
    #[must_use]
    pub fn history(&self, count: usize) -> Vec<AgentRecord, TELEMETRY_RING_CAPACITY> {
        self.telemetry.lock(|telemetry| {
            let telemetry = telemetry.borrow();
            let skip = telemetry.len().saturating_sub(count);
            telemetry.oldest_first().skip(skip).copied().collect()
        })
    }

    /// Milliseconds since the agent was created; the detector's clock.
    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        AgentInstant::now().millis_since(self.epoch)
    }

    /// Milliseconds between agent creation and `instant`.
    #[must_use]
    pub fn offset_ms(&self, instant: AgentInstant) -> u64 {
        instant.millis_since(self.epoch)
    }

    pub(crate) fn with_tracker<R>(&self, f: impl FnOnce(&mut StepTracker) -> R) -> R {
        self.tracker.lock(|tracker| f(&mut tracker.borrow_mut()))
    }

    pub(crate) fn set_home(&self, summary: Option<HomeSummary>) {
        self.home.lock(|home| *home.borrow_mut() = summary);
    }

    /// Records into the telemetry ring and mirrors the new record to the log.
    pub(crate) fn record(&self, event: TelemetryEventKind, payload: TelemetryPayload) {
        self.with_telemetry(|telemetry, now| {
            telemetry.record(event, payload, now);
        });
    }

    pub(crate) fn with_telemetry<R>(
        &self,
        f: impl FnOnce(&mut AgentTelemetry, AgentInstant) -> R,
    ) -> R {
        self.telemetry.lock(|telemetry| {
            let mut telemetry = telemetry.borrow_mut();
            let before = telemetry.latest().map(|record| record.id);
            let result = f(&mut telemetry, AgentInstant::now());
            if let Some(record) = telemetry.latest()
                && Some(record.id) != before
            {
                mirror(record, self.epoch);
            }
            result
        })
    }

    pub(crate) fn publish(&self, event: AgentEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            warn!(?event, "front-end event queue full; dropping event");
        }
    }
}

pub(crate) fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}
