//! Signup, login and session issuance.
//!
//! [`AuthService`] owns the whole credential flow. Stores and the password
//! hasher are injected as trait objects so the HTTP layer never touches
//! storage or hashing directly.

mod error;
mod hasher;
mod service;

pub use error::{
    AuthError, ValidationError, MSG_INTERNAL, MSG_INVALID_CREDENTIALS, MSG_INVALID_USERNAME,
    MSG_MISSING_FIELDS, MSG_STORE_UNAVAILABLE, MSG_USERNAME_TAKEN, MSG_USERNAME_TOO_LONG,
};
pub use hasher::{Argon2Hasher, HashError, Hasher};
pub use service::AuthService;

use crate::store::USERNAME_MAX_LEN;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

/// A validated username/password pair.
///
/// The username is trimmed; the password is kept exactly as submitted.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// # Errors
    /// [`AuthError::Validation`] when either field is empty, or the username is
    /// longer than the `accounts.username` column allows or contains control
    /// characters.
    pub fn new(username: &str, password: SecretString) -> Result<Self, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(AuthError::Validation(ValidationError::MissingFields));
        }
        if username.chars().count() > USERNAME_MAX_LEN {
            return Err(AuthError::Validation(ValidationError::UsernameTooLong));
        }
        if username.chars().any(char::is_control) {
            return Err(AuthError::Validation(ValidationError::InvalidUsername));
        }

        Ok(Self {
            username: username.to_string(),
            password,
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    fn into_parts(self) -> (String, SecretString) {
        (self.username, self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
