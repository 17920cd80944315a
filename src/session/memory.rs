use super::{Session, SessionStore};
use crate::{now_unix_seconds, store::StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, token_hash: &[u8], session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(token_hash.to_vec(), session.clone());
        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError> {
        let now = now_unix_seconds();
        Ok(self
            .sessions
            .read()
            .await
            .get(token_hash)
            .filter(|session| !session.is_expired_at(now))
            .cloned())
    }

    async fn invalidate(&self, token_hash: &[u8]) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(token_hash).is_some())
    }

    async fn invalidate_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = now_unix_seconds();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}
