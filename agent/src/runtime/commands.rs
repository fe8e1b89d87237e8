use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use stride_core::credentials::CredentialStore;
use stride_core::session::SessionEnd;
use stride_core::telemetry::{CounterTelemetry, TelemetryEventKind, TelemetryPayload};
use tracing::{debug, info, warn};

use super::{Agent, AgentCommand, AgentEvent};
use crate::error::LoginError;
use crate::platform::StepApi;

impl<M: RawMutex> Agent<M> {
    /// Handles commands while signed out until a login succeeds.
    pub(super) async fn await_login<A, C>(&self, api: &A, store: &RefCell<&mut C>)
    where
        A: StepApi,
        C: CredentialStore,
    {
        loop {
            let command = self.commands.receive().await;
            debug!(command = command.label(), "command received while signed out");
            match command {
                AgentCommand::Login { username, password } => {
                    match self.login(api, store, &username, &password).await {
                        Ok(()) => return,
                        Err(error) => {
                            warn!(%error, username, "login failed");
                            self.publish(AgentEvent::LoginFailed(error));
                        }
                    }
                }
                other => self.publish(AgentEvent::NotLoggedIn(other.label())),
            }
        }
    }

    async fn login<A, C>(
        &self,
        api: &A,
        store: &RefCell<&mut C>,
        username: &str,
        password: &str,
    ) -> Result<(), LoginError>
    where
        A: StepApi,
        C: CredentialStore,
    {
        let token = api.login(username, password).await?;
        store
            .borrow_mut()
            .save_token(&token)
            .map_err(|error| LoginError::Store(error.to_string()))?;
        info!(username, "login succeeded");
        Ok(())
    }

    /// Handles commands during a session. Completes when the session must end.
    pub(super) async fn command_loop<A, C>(&self, api: &A, store: &RefCell<&mut C>) -> SessionEnd
    where
        A: StepApi,
        C: CredentialStore,
    {
        loop {
            let command = self.commands.receive().await;
            debug!(command = command.label(), "command received");
            match command {
                AgentCommand::Login { .. } => {
                    self.publish(AgentEvent::LoginFailed(LoginError::AlreadyLoggedIn));
                }
                AgentCommand::Logout => {
                    info!("logout requested");
                    return SessionEnd::Logout;
                }
                AgentCommand::SyncNow => {
                    let report = self.upload_once(api, store).await;
                    self.publish(AgentEvent::Upload(report));
                }
                AgentCommand::Refresh => {
                    if let Some(end) = self.refresh_home(api, store).await {
                        return end;
                    }
                }
            }
        }
    }

    /// Fetches the dashboard and adopts its step total.
    ///
    /// Returns `Some(SessionEnd::Expired)` when the server no longer accepts
    /// the token, or when no token is left to present.
    pub(super) async fn refresh_home<A, C>(
        &self,
        api: &A,
        store: &RefCell<&mut C>,
    ) -> Option<SessionEnd>
    where
        A: StepApi,
        C: CredentialStore,
    {
        let Some(token) = self.read_token(store) else {
            warn!("no credential for home refresh; ending session");
            return Some(SessionEnd::Expired);
        };

        match api.fetch_home(token.as_ref()).await {
            Ok(summary) => {
                let applied = self.with_tracker(|tracker| {
                    tracker.apply_server_total(summary.total_steps)?;
                    Some(CounterTelemetry::new(tracker.display(), tracker.pending()))
                });
                let Some(counters) = applied else {
                    return None;
                };
                self.record(
                    TelemetryEventKind::ServerTotalApplied,
                    TelemetryPayload::Counters(counters),
                );
                self.set_home(Some(summary.clone()));
                self.publish(AgentEvent::HomeRefreshed(summary));
                None
            }
            Err(error) if error.is_unauthorized() => {
                warn!("home refresh rejected the token; session expired");
                Some(SessionEnd::Expired)
            }
            Err(error) => {
                warn!(%error, "home refresh failed");
                self.publish(AgentEvent::RefreshFailed(error));
                None
            }
        }
    }
}
