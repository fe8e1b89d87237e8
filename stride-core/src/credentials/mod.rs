//! Key-value credential storage seam.
//!
//! The platform store (keychain, file, browser storage) is out of scope; the
//! tracker only needs `get`/`set`/`delete` on string keys and reads the token
//! before every authenticated request.

use core::fmt;

use heapless::{String, Vec};

use crate::api::TOKEN_KEY;

/// Longest value [`MemoryCredentialStore`] can hold.
pub const MAX_CREDENTIAL_LEN: usize = 1024;

/// Longest key accepted by [`MemoryCredentialStore`].
pub const MAX_KEY_LEN: usize = 32;

/// Value type of [`MemoryCredentialStore`].
pub type MemoryCredential = String<MAX_CREDENTIAL_LEN>;

/// Platform secure key-value store.
pub trait CredentialStore {
    /// Backend-specific failure.
    type Error: fmt::Debug + fmt::Display;

    /// Owned value returned by [`get`](Self::get). Its capacity is the
    /// backend's choice; the tracker only reads it as a string.
    type Credential: AsRef<str>;

    /// Returns the stored value, or `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the store cannot be read.
    fn get(&mut self, key: &str) -> Result<Option<Self::Credential>, Self::Error>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the value cannot be persisted.
    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Removes `key`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the store cannot be updated.
    fn delete(&mut self, key: &str) -> Result<(), Self::Error>;

    /// Reads the bearer token.
    ///
    /// # Errors
    ///
    /// Propagates [`get`](Self::get) failures.
    fn token(&mut self) -> Result<Option<Self::Credential>, Self::Error> {
        self.get(TOKEN_KEY)
    }

    /// Persists the bearer token.
    ///
    /// # Errors
    ///
    /// Propagates [`set`](Self::set) failures.
    fn save_token(&mut self, token: &str) -> Result<(), Self::Error> {
        self.set(TOKEN_KEY, token)
    }

    /// Deletes the bearer token.
    ///
    /// # Errors
    ///
    /// Propagates [`delete`](Self::delete) failures.
    fn clear_token(&mut self) -> Result<(), Self::Error> {
        self.delete(TOKEN_KEY)
    }
}

/// Failures of [`MemoryCredentialStore`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CredentialError {
    KeyTooLong,
    ValueTooLong,
    StoreFull,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::KeyTooLong => write!(f, "key exceeds {MAX_KEY_LEN} bytes"),
            CredentialError::ValueTooLong => {
                write!(f, "value exceeds {MAX_CREDENTIAL_LEN} bytes")
            }
            CredentialError::StoreFull => f.write_str("credential store is full"),
        }
    }
}

impl core::error::Error for CredentialError {}

/// Copies `value` into an owned [`MemoryCredential`].
///
/// # Errors
///
/// Returns [`CredentialError::ValueTooLong`] when `value` does not fit.
pub fn credential_from_str(value: &str) -> Result<MemoryCredential, CredentialError> {
    MemoryCredential::try_from(value).map_err(|_| CredentialError::ValueTooLong)
}

const MEMORY_SLOTS: usize = 4;

/// Fixed-capacity in-memory store, used by tests and offline runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Vec<(String<MAX_KEY_LEN>, MemoryCredential), MEMORY_SLOTS>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a store that already holds a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::ValueTooLong`] when the token does not fit.
    pub fn with_token(token: &str) -> Result<Self, CredentialError> {
        let mut store = Self::new();
        store.set(TOKEN_KEY, token)?;
        Ok(store)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.as_str() == key)
    }
}

impl CredentialStore for MemoryCredentialStore {
    type Error = CredentialError;
    type Credential = MemoryCredential;

    fn get(&mut self, key: &str) -> Result<Option<Self::Credential>, Self::Error> {
        Ok(self.position(key).map(|index| self.entries[index].1.clone()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        let value = credential_from_str(value)?;
        if let Some(index) = self.position(key) {
            self.entries[index].1 = value;
            return Ok(());
        }

        let key = String::try_from(key).map_err(|_| CredentialError::KeyTooLong)?;
        self.entries
            .push((key, value))
            .map_err(|_| CredentialError::StoreFull)
    }

    fn delete(&mut self, key: &str) -> Result<(), Self::Error> {
        if let Some(index) = self.position(key) {
            self.entries.swap_remove(index);
        }
        Ok(())
    }
}
