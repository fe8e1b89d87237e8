//! Contract with the step back-end: routes, credential key, and how raw
//! responses map onto success or [`ApiError`].

use core::fmt;

use crate::sync::SyncAck;

/// `POST` endpoint accepting `{ "steps": n }` deltas.
pub const SYNC_PATH: &str = "/api/steps/sync";

/// `POST` endpoint accepting `{ "username", "password" }`.
pub const LOGIN_PATH: &str = "/api/auth/login";

/// `GET` endpoint returning the home dashboard summary.
pub const HOME_PATH: &str = "/api/home";

/// Key under which the bearer token is kept in the credential store.
pub const TOKEN_KEY: &str = "userToken";

/// Failures reported by a step API transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ApiError {
    /// Connection could not be established or broke mid-request.
    Transport,
    /// Platform request timeout elapsed.
    Timeout,
    /// Non-success HTTP status other than 401.
    Status(u16),
    /// HTTP 401: the token is no longer valid.
    Unauthorized,
    /// Body could not be decoded.
    Malformed,
    /// Server answered 2xx but with `success: false`.
    Rejected,
}

impl ApiError {
    /// Returns `true` when the stored credential should be discarded.
    #[must_use]
    pub const fn is_unauthorized(self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport => f.write_str("network error"),
            ApiError::Timeout => f.write_str("request timed out"),
            ApiError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            ApiError::Unauthorized => f.write_str("session expired"),
            ApiError::Malformed => f.write_str("malformed response"),
            ApiError::Rejected => f.write_str("rejected by server"),
        }
    }
}

impl core::error::Error for ApiError {}

/// Maps an HTTP status onto the error space, treating any 2xx as success.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] for 401 and [`ApiError::Status`] for any
/// other non-2xx code.
pub const fn check_status(status: u16) -> Result<(), ApiError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(ApiError::Unauthorized),
        other => Err(ApiError::Status(other)),
    }
}

/// Decides whether a sync response acknowledges the batch.
///
/// `success` is the decoded `success` field of the body, or `None` when the
/// body could not be decoded. Only a 2xx status with `success: true` counts.
///
/// # Errors
///
/// Returns the failure class when the batch must stay pending.
pub const fn classify_sync_response(
    status: u16,
    success: Option<bool>,
) -> Result<SyncAck, ApiError> {
    if let Err(error) = check_status(status) {
        return Err(error);
    }
    match success {
        Some(true) => Ok(SyncAck),
        Some(false) => Err(ApiError::Rejected),
        None => Err(ApiError::Malformed),
    }
}
