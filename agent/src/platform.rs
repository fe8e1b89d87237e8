//! Seams between the runtime and the platform it runs on.
//!
//! The host emulator backs these with a simulated accelerometer and an HTTP
//! client; tests back them with scripted fakes.

use core::time::Duration;

use stride_core::api::ApiError;
use stride_core::motion::{MotionSample, SensorUnavailable};
use stride_core::sync::SyncAck;

use crate::error::LoginError;

/// Accelerometer subscription.
#[allow(async_fn_in_trait)]
pub trait MotionSensor {
    /// Starts delivering samples every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`SensorUnavailable`] on platforms without an accelerometer;
    /// the session then runs without sampling.
    fn start(&mut self, interval: Duration) -> Result<(), SensorUnavailable>;

    /// Waits for the next sample. Only polled after a successful [`start`](Self::start).
    async fn next_sample(&mut self) -> MotionSample;

    /// Cancels the subscription. Safe to call when not started.
    fn stop(&mut self);
}

/// Step back-end client.
#[allow(async_fn_in_trait)]
pub trait StepApi {
    /// Exchanges credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Denied`] with the server message when the
    /// credentials are refused, or [`LoginError::Api`] on transport failure.
    async fn login(&self, username: &str, password: &str) -> Result<String, LoginError>;

    /// Sends a step delta. Only an explicit acknowledgement may be returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] class of the failure.
    async fn sync_steps(&self, token: &str, steps: u32) -> Result<SyncAck, ApiError>;

    /// Fetches the home dashboard for the token's user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when the token has expired.
    async fn fetch_home(&self, token: &str) -> Result<HomeSummary, ApiError>;
}

/// Next landmark on the user's route.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Landmark {
    pub name: String,
    pub required_steps: u32,
}

/// Dashboard data returned by the home endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HomeSummary {
    pub nickname: String,
    pub total_steps: u32,
    pub representative_title: Option<String>,
    pub rank: Option<u32>,
    pub landmark: Option<Landmark>,
    pub current_location: Option<String>,
}

impl HomeSummary {
    /// Steps still needed to reach the target landmark from `display`.
    #[must_use]
    pub fn steps_to_landmark(&self, display: u32) -> Option<u32> {
        self.landmark
            .as_ref()
            .map(|landmark| landmark.required_steps.saturating_sub(display))
    }
}
