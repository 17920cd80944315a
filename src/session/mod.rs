//! Server-side sessions.
//!
//! The client holds a random token; stores only ever see its SHA-256.

mod memory;
mod postgres;
mod token;

pub use memory::InMemorySessionStore;
pub use postgres::PgSessionStore;
pub use token::{generate_session_token, hash_session_token};

use crate::store::StoreError;
use async_trait::async_trait;

/// Session state bound to an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub created_at_unix: i64,
    pub expires_at_unix: i64,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        self.expires_at_unix <= now_unix
    }
}

/// A freshly created session and the raw token handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, token_hash: &[u8], session: &Session) -> Result<(), StoreError>;

    /// Unexpired session for the token hash, if any.
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError>;

    /// Returns whether a session was removed.
    async fn invalidate(&self, token_hash: &[u8]) -> Result<bool, StoreError>;

    /// Drop every session of an account; returns how many were removed.
    async fn invalidate_user(&self, user_id: i64) -> Result<u64, StoreError>;

    async fn purge_expired(&self) -> Result<u64, StoreError>;
}
