use super::hasher::HashError;
use crate::store::StoreError;
use thiserror::Error;

pub const MSG_MISSING_FIELDS: &str = "Missing fields";
pub const MSG_USERNAME_TOO_LONG: &str = "Username too long";
pub const MSG_INVALID_USERNAME: &str = "Invalid username";
pub const MSG_USERNAME_TAKEN: &str = "Username already taken";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const MSG_STORE_UNAVAILABLE: &str =
    "Cannot connect to database. Run `studysync setup` first or check credentials.";
pub const MSG_INTERNAL: &str = "Internal server error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingFields,
    UsernameTooLong,
    /// Control characters, NUL included, which the database refuses to store.
    InvalidUsername,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0:?}")]
    Validation(ValidationError),

    #[error("username already taken")]
    Conflict,

    /// Unknown username or wrong password; callers cannot tell which.
    #[error("invalid credentials")]
    Authentication,

    #[error(transparent)]
    Storage(StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}

impl AuthError {
    /// Message safe to show to the client.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::MissingFields) => MSG_MISSING_FIELDS,
            Self::Validation(ValidationError::UsernameTooLong) => MSG_USERNAME_TOO_LONG,
            Self::Validation(ValidationError::InvalidUsername) => MSG_INVALID_USERNAME,
            Self::Conflict => MSG_USERNAME_TAKEN,
            Self::Authentication => MSG_INVALID_CREDENTIALS,
            Self::Storage(StoreError::Unavailable(_)) => MSG_STORE_UNAVAILABLE,
            Self::Storage(_) | Self::Hashing(_) | Self::Internal(_) => MSG_INTERNAL,
        }
    }

    /// Server-side faults, as opposed to answers about the request itself.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Hashing(_) | Self::Internal(_)
        )
    }
}
