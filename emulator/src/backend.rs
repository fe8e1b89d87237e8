use stride_agent::{HomeSummary, LoginError, StepApi};
use stride_core::api::ApiError;
use stride_core::sync::SyncAck;

use crate::http::HttpStepApi;
use crate::loopback::LoopbackApi;

/// Step API selected on the command line.
#[derive(Debug)]
pub enum Backend {
    Http(HttpStepApi),
    Loopback(LoopbackApi),
}

impl Backend {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Backend::Http(api) => api.base_url().to_owned(),
            Backend::Loopback(_) => "offline loopback".to_owned(),
        }
    }
}

impl StepApi for Backend {
    async fn login(&self, username: &str, password: &str) -> Result<String, LoginError> {
        match self {
            Backend::Http(api) => api.login(username, password).await,
            Backend::Loopback(api) => api.login(username, password).await,
        }
    }

    async fn sync_steps(&self, token: &str, steps: u32) -> Result<SyncAck, ApiError> {
        match self {
            Backend::Http(api) => api.sync_steps(token, steps).await,
            Backend::Loopback(api) => api.sync_steps(token, steps).await,
        }
    }

    async fn fetch_home(&self, token: &str) -> Result<HomeSummary, ApiError> {
        match self {
            Backend::Http(api) => api.fetch_home(token).await,
            Backend::Loopback(api) => api.fetch_home(token).await,
        }
    }
}
