//! Credential storage.
//!
//! Accounts are only reachable through [`CredentialStore`]: an exact lookup by
//! username and an insert that rejects duplicate usernames atomically.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::{apply_schema, classify_sqlx_error, is_unique_violation, PgCredentialStore};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Maximum username length, matching the `VARCHAR(100)` column.
pub const USERNAME_MAX_LEN: usize = 100;

/// A stored identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at_unix: i64,
}

// password_hash stays out of logs
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at_unix", &self.created_at_unix)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("store query failed: {0}")]
    Query(#[source] sqlx::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact, case-sensitive match. `Ok(None)` when absent.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] when `username` is already taken. The check and
    /// the insert are a single atomic step.
    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
