//! Write-ahead buffer of unacknowledged steps and its upload bookkeeping.
//!
//! The buffer never clears itself on send. An upload snapshots the pending
//! count into an [`UploadTicket`]; only an acknowledged ticket subtracts its
//! own amount, so steps detected while the request is outstanding survive.
//! Delivery is at-least-once: a request the server applied but whose
//! acknowledgement was lost is resent with the next batch.

use core::fmt;

use crate::api::ApiError;

/// Sequential upload number. Logged only; not sent.
///
/// Numbering continues across sessions, so a ticket issued before a logout
/// never matches one issued after the next login.
pub type BatchNumber = u32;

/// Snapshot of the pending count handed to the uploader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UploadTicket {
    pub batch: BatchNumber,
    pub steps: u32,
}

/// Server confirmation that a sync request was applied.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncAck;

/// Reasons an upload tick did not start a request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UploadSkip {
    /// Pending count is zero.
    NothingPending,
    /// A previous ticket has not completed yet.
    InFlight(BatchNumber),
    /// No bearer token is stored.
    MissingCredential,
}

impl fmt::Display for UploadSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSkip::NothingPending => f.write_str("nothing pending"),
            UploadSkip::InFlight(batch) => write!(f, "batch #{batch} still in flight"),
            UploadSkip::MissingCredential => f.write_str("no stored credential"),
        }
    }
}

/// Result of applying an upload outcome to the buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UploadOutcome {
    /// Ticket acknowledged; `remaining` steps are still pending.
    Acknowledged { steps: u32, remaining: u32 },
    /// Ticket failed; nothing was subtracted.
    Retained { pending: u32, error: ApiError },
    /// Ticket did not belong to the outstanding upload and was ignored.
    Stale,
}

/// Per-session upload counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncStats {
    pub attempts: u32,
    pub acknowledged: u32,
    pub failures: u32,
    pub skipped: u32,
    pub steps_acknowledged: u64,
}

/// Pending step counter plus the in-flight guard.
#[derive(Clone, Debug, Default)]
pub struct SyncBuffer {
    pending: u32,
    in_flight: Option<UploadTicket>,
    next_batch: BatchNumber,
    stats: SyncStats,
}

impl SyncBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty buffer whose first ticket is numbered `batch`.
    #[must_use]
    pub const fn starting_at(batch: BatchNumber) -> Self {
        Self {
            pending: 0,
            in_flight: None,
            next_batch: batch,
            stats: SyncStats {
                attempts: 0,
                acknowledged: 0,
                failures: 0,
                skipped: 0,
                steps_acknowledged: 0,
            },
        }
    }

    /// Steps detected but not yet acknowledged by the server.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.pending
    }

    /// The outstanding ticket, if an upload is in flight.
    #[must_use]
    pub const fn in_flight(&self) -> Option<UploadTicket> {
        self.in_flight
    }

    /// Number the next ticket will carry.
    #[must_use]
    pub const fn next_batch(&self) -> BatchNumber {
        self.next_batch
    }

    #[must_use]
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Adds one detected step to the buffer.
    pub fn record_step(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    /// Snapshots the pending count into a new ticket.
    ///
    /// `credential` is whatever the token store returned for this tick; it is
    /// handed back with the ticket so the caller cannot send without one. The
    /// pending count is left untouched whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`UploadSkip`] reason when no request should be made.
    pub fn begin_upload<C>(
        &mut self,
        credential: Option<C>,
    ) -> Result<(UploadTicket, C), UploadSkip> {
        let credential = match (self.pending, self.in_flight, credential) {
            (0, _, _) => Err(UploadSkip::NothingPending),
            (_, Some(ticket), _) => Err(UploadSkip::InFlight(ticket.batch)),
            (_, None, None) => Err(UploadSkip::MissingCredential),
            (_, None, Some(credential)) => Ok(credential),
        };

        let credential = match credential {
            Ok(credential) => credential,
            Err(reason) => {
                self.stats.skipped = self.stats.skipped.saturating_add(1);
                return Err(reason);
            }
        };

        let ticket = UploadTicket {
            batch: self.next_batch,
            steps: self.pending,
        };
        self.next_batch = self.next_batch.wrapping_add(1);
        self.in_flight = Some(ticket);
        self.stats.attempts = self.stats.attempts.saturating_add(1);
        Ok((ticket, credential))
    }

    /// Applies the server response for `ticket` and releases the in-flight guard.
    pub fn complete(
        &mut self,
        ticket: UploadTicket,
        result: Result<SyncAck, ApiError>,
    ) -> UploadOutcome {
        if self.in_flight != Some(ticket) {
            return UploadOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(SyncAck) => {
                self.pending = self.pending.saturating_sub(ticket.steps);
                self.stats.acknowledged = self.stats.acknowledged.saturating_add(1);
                self.stats.steps_acknowledged = self
                    .stats
                    .steps_acknowledged
                    .saturating_add(u64::from(ticket.steps));
                UploadOutcome::Acknowledged {
                    steps: ticket.steps,
                    remaining: self.pending,
                }
            }
            Err(error) => {
                self.stats.failures = self.stats.failures.saturating_add(1);
                UploadOutcome::Retained {
                    pending: self.pending,
                    error,
                }
            }
        }
    }

    /// Drops every pending step and any outstanding ticket.
    ///
    /// Batch numbering carries on, so tickets issued before the clear stay stale.
    pub fn clear(&mut self) {
        *self = Self::starting_at(self.next_batch);
    }
}
