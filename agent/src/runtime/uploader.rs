use core::cell::RefCell;
use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Ticker;
use stride_core::credentials::CredentialStore;
use stride_core::sync::{UploadOutcome, UploadSkip};
use tracing::{debug, info, warn};

use super::{Agent, UploadReport, core_duration_to_embassy};
use crate::platform::StepApi;

impl<M: RawMutex> Agent<M> {
    /// Attempts an upload every flush interval for the rest of the session.
    pub(super) async fn upload_loop<A, C>(&self, api: &A, store: &RefCell<&mut C>) -> Infallible
    where
        A: StepApi,
        C: CredentialStore,
    {
        let mut ticker = Ticker::every(core_duration_to_embassy(self.config.flush_interval));
        loop {
            ticker.next().await;
            self.upload_once(api, store).await;
        }
    }

    /// Sends the current pending count once.
    ///
    /// The tracker lock is released while the request is outstanding; steps
    /// detected meanwhile stay pending after the acknowledged amount is
    /// subtracted.
    pub(super) async fn upload_once<A, C>(&self, api: &A, store: &RefCell<&mut C>) -> UploadReport
    where
        A: StepApi,
        C: CredentialStore,
    {
        let token = self.read_token(store);
        let (ticket, token) = match self.with_tracker(|tracker| tracker.begin_upload(token)) {
            Ok(started) => started,
            Err(UploadSkip::NothingPending) => {
                return UploadReport::Skipped(UploadSkip::NothingPending);
            }
            Err(reason) => {
                self.with_telemetry(|telemetry, now| {
                    telemetry.record_upload_skipped(reason, now);
                });
                return UploadReport::Skipped(reason);
            }
        };

        self.with_telemetry(|telemetry, now| {
            telemetry.record_upload_started(ticket, now);
        });

        let result = api.sync_steps(token.as_ref(), ticket.steps).await;
        let outcome = self.with_tracker(|tracker| tracker.complete_upload(ticket, result));

        match outcome {
            UploadOutcome::Acknowledged { steps, remaining } => {
                info!(batch = ticket.batch, steps, remaining, "steps synced");
            }
            UploadOutcome::Retained { pending, error } => {
                warn!(batch = ticket.batch, pending, %error, "sync failed; will retry");
            }
            UploadOutcome::Stale => {
                debug!(batch = ticket.batch, "sync result arrived after session ended");
            }
        }
        self.with_telemetry(|telemetry, now| {
            telemetry.record_upload_outcome(ticket, outcome, now);
        });

        UploadReport::Finished { ticket, outcome }
    }
}
