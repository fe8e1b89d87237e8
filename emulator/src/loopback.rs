//! In-process stand-in for the step back-end, used with `--offline`.
//!
//! Any username with a non-empty password signs in. Tokens are derived from
//! the username so a token saved by an earlier run still resolves. Sync is
//! additive, matching the real server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use stride_agent::{HomeSummary, Landmark, LoginError, StepApi};
use stride_core::api::ApiError;
use stride_core::sync::SyncAck;
use tracing::debug;

const TOKEN_PREFIX: &str = "loopback-";

/// Landmarks are spaced this many steps apart along the loopback route.
const LANDMARK_SPACING: u32 = 1_000;

const LANDMARKS: &[&str] = &[
    "Trailhead",
    "Old Mill",
    "River Crossing",
    "Lookout Point",
    "Summit Cairn",
];

#[derive(Debug, Default)]
struct LoopbackState {
    totals: HashMap<String, u32>,
    revoked: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LoopbackApi {
    state: Mutex<LoopbackState>,
}

impl LoopbackApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-side total for `username`.
    #[must_use]
    pub fn total_for(&self, username: &str) -> u32 {
        self.lock().totals.get(username).copied().unwrap_or(0)
    }

    /// Makes every later request with `username`'s token answer 401.
    pub fn revoke(&self, username: &str) {
        self.lock().revoked.push(username.to_owned());
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn user_for<'t>(&self, token: &'t str) -> Result<&'t str, ApiError> {
        let username = token
            .strip_prefix(TOKEN_PREFIX)
            .filter(|name| !name.is_empty())
            .ok_or(ApiError::Unauthorized)?;
        if self.lock().revoked.iter().any(|name| name == username) {
            return Err(ApiError::Unauthorized);
        }
        Ok(username)
    }
}

impl StepApi for LoopbackApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, LoginError> {
        if password.is_empty() {
            return Err(LoginError::Denied("password required".to_owned()));
        }
        let mut state = self.lock();
        state.revoked.retain(|name| name != username);
        state.totals.entry(username.to_owned()).or_insert(0);
        debug!(username, "loopback login");
        Ok(format!("{TOKEN_PREFIX}{username}"))
    }

    async fn sync_steps(&self, token: &str, steps: u32) -> Result<SyncAck, ApiError> {
        let username = self.user_for(token)?;
        let mut state = self.lock();
        let total = state.totals.entry(username.to_owned()).or_insert(0);
        *total = total.saturating_add(steps);
        debug!(username, steps, total = *total, "loopback sync");
        Ok(SyncAck)
    }

    async fn fetch_home(&self, token: &str) -> Result<HomeSummary, ApiError> {
        let username = self.user_for(token)?;
        let total_steps = self.total_for(username);
        Ok(HomeSummary {
            nickname: username.to_owned(),
            total_steps,
            representative_title: None,
            rank: Some(1),
            landmark: Some(next_landmark(total_steps)),
            current_location: Some(current_location(total_steps).to_owned()),
        })
    }
}

fn landmark_index(total_steps: u32) -> usize {
    usize::try_from(total_steps / LANDMARK_SPACING)
        .unwrap_or(usize::MAX)
        .min(LANDMARKS.len() - 1)
}

fn current_location(total_steps: u32) -> &'static str {
    LANDMARKS[landmark_index(total_steps)]
}

fn next_landmark(total_steps: u32) -> Landmark {
    let next = (landmark_index(total_steps) + 1).min(LANDMARKS.len() - 1);
    let required = u32::try_from(next)
        .unwrap_or(u32::MAX)
        .saturating_mul(LANDMARK_SPACING)
        .max(total_steps);
    Landmark {
        name: LANDMARKS[next].to_owned(),
        required_steps: required,
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn sync_is_additive_per_user() {
        let api = LoopbackApi::new();
        let token = block_on(api.login("walker", "pw")).unwrap();

        assert_eq!(block_on(api.sync_steps(&token, 5)), Ok(SyncAck));
        assert_eq!(block_on(api.sync_steps(&token, 7)), Ok(SyncAck));
        assert_eq!(api.total_for("walker"), 12);

        let home = block_on(api.fetch_home(&token)).unwrap();
        assert_eq!(home.total_steps, 12);
        assert_eq!(home.nickname, "walker");
    }

    #[test]
    fn empty_password_is_refused() {
        let api = LoopbackApi::new();
        assert_eq!(
            block_on(api.login("walker", "")),
            Err(LoginError::Denied("password required".to_owned()))
        );
    }

    #[test]
    fn foreign_or_revoked_tokens_are_unauthorized() {
        let api = LoopbackApi::new();
        assert_eq!(
            block_on(api.sync_steps("jwt-from-elsewhere", 1)),
            Err(ApiError::Unauthorized)
        );

        let token = block_on(api.login("walker", "pw")).unwrap();
        api.revoke("walker");
        assert_eq!(
            block_on(api.fetch_home(&token)),
            Err(ApiError::Unauthorized)
        );

        let token = block_on(api.login("walker", "pw")).unwrap();
        assert!(block_on(api.fetch_home(&token)).is_ok());
    }

    #[test]
    fn landmarks_advance_with_total() {
        assert_eq!(current_location(0), "Trailhead");
        assert_eq!(next_landmark(0).required_steps, 1_000);
        assert_eq!(current_location(2_400), "River Crossing");
        assert_eq!(next_landmark(2_400).name, "Lookout Point");

        let last = next_landmark(u32::MAX);
        assert_eq!(last.name, "Summit Cairn");
        assert_eq!(last.required_steps, u32::MAX);
    }
}
