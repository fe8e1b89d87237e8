use core::cell::RefCell;
use core::convert::Infallible;

use embassy_futures::select::{Either3, select3};
use embassy_sync::blocking_mutex::raw::RawMutex;
use stride_core::credentials::CredentialStore;
use stride_core::session::SessionEnd;
use stride_core::telemetry::{TelemetryEventKind, TelemetryPayload};
use tracing::{info, warn};

use super::{Agent, AgentEvent};
use crate::platform::{MotionSensor, StepApi};

impl<M: RawMutex> Agent<M> {
    /// Drives the tracker forever.
    ///
    /// A token already present in `store` resumes a session without a login
    /// call. Otherwise the runtime idles until a login command succeeds.
    pub async fn run<S, A, C>(&self, sensor: &mut S, api: &A, store: &mut C) -> Infallible
    where
        S: MotionSensor,
        A: StepApi,
        C: CredentialStore,
    {
        let store = RefCell::new(store);
        let mut resumed = self.read_token(&store).is_some();
        if resumed {
            info!("stored credential found; resuming session");
        }

        loop {
            if !resumed {
                self.await_login(api, &store).await;
            }
            let end = self.run_session(sensor, api, &store, resumed).await;
            self.finish_session(end, &store);
            resumed = false;
        }
    }

    async fn run_session<S, A, C>(
        &self,
        sensor: &mut S,
        api: &A,
        store: &RefCell<&mut C>,
        resumed: bool,
    ) -> SessionEnd
    where
        S: MotionSensor,
        A: StepApi,
        C: CredentialStore,
    {
        self.with_tracker(|tracker| tracker.start_session());
        self.set_home(None);
        self.record(TelemetryEventKind::SessionStarted, TelemetryPayload::none());
        self.publish(AgentEvent::SessionStarted { resumed });

        let started = sensor.start(self.config.sample_interval);
        let sensing = started.is_ok();
        self.with_tracker(|tracker| tracker.sensor_started(started));
        if !sensing {
            self.record(TelemetryEventKind::SensorUnsupported, TelemetryPayload::none());
            self.publish(AgentEvent::SensorUnsupported);
        }

        let end = if self.refresh_home(api, store).await == Some(SessionEnd::Expired) {
            SessionEnd::Expired
        } else {
            match select3(
                self.command_loop(api, store),
                self.sample_loop(sensor, sensing),
                self.upload_loop(api, store),
            )
            .await
            {
                Either3::First(end) => end,
                Either3::Second(never) | Either3::Third(never) => match never {},
            }
        };

        if sensing {
            sensor.stop();
        }
        end
    }

    fn finish_session<C: CredentialStore>(&self, end: SessionEnd, store: &RefCell<&mut C>) {
        let discarded = self
            .with_tracker(|tracker| tracker.end_session(end))
            .unwrap_or(0);
        self.set_home(None);
        self.record(TelemetryEventKind::SessionEnded(end), TelemetryPayload::none());

        if end != SessionEnd::Teardown {
            self.clear_token(store);
        }
        if discarded > 0 {
            warn!(discarded, "unsent steps dropped with the session");
        }

        match end {
            SessionEnd::Logout => self.publish(AgentEvent::LoggedOut { discarded }),
            SessionEnd::Expired => self.publish(AgentEvent::SessionExpired { discarded }),
            SessionEnd::Teardown => {}
        }
    }

    /// Reads the bearer token; a failing store counts as no token.
    pub(crate) fn read_token<C: CredentialStore>(
        &self,
        store: &RefCell<&mut C>,
    ) -> Option<C::Credential> {
        match store.borrow_mut().token() {
            Ok(token) => token,
            Err(error) => {
                warn!(%error, "credential store read failed");
                None
            }
        }
    }

    pub(crate) fn clear_token<C: CredentialStore>(&self, store: &RefCell<&mut C>) {
        if let Err(error) = store.borrow_mut().clear_token() {
            warn!(%error, "credential store delete failed");
        }
    }
}
