use stride_core::api::ApiError;
use thiserror::Error;

/// Why a login attempt did not start a session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LoginError {
    #[error("login refused: {0}")]
    Denied(String),
    #[error("login request failed: {0}")]
    Api(#[from] ApiError),
    #[error("could not store credential: {0}")]
    Store(String),
    #[error("already logged in")]
    AlreadyLoggedIn,
}
