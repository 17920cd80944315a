use super::{Account, CredentialStore, StoreError};
use crate::now_unix_seconds;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local credential store.
///
/// The lookup-and-insert happens under one lock, which gives the same
/// guarantee as the unique constraint in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Accounts>,
}

#[derive(Debug, Default)]
struct Accounts {
    next_id: i64,
    by_username: HashMap<String, Account>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.by_username.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.lock().await.by_username.get(username).cloned())
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError> {
        let mut accounts = self.inner.lock().await;
        if accounts.by_username.contains_key(username) {
            return Err(StoreError::Conflict);
        }

        accounts.next_id += 1;
        let account = Account {
            id: accounts.next_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at_unix: now_unix_seconds(),
        };
        accounts
            .by_username
            .insert(username.to_string(), account.clone());

        Ok(account)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[tokio::test]
    async fn insert_then_find() -> Result<()> {
        let store = InMemoryCredentialStore::new();
        let account = store.insert("alice", "hash").await?;
        assert_eq!(account.id, 1);

        let found = store
            .find_by_username("alice")
            .await?
            .context("alice should exist")?;
        assert_eq!(found, account);
        Ok(())
    }

    #[tokio::test]
    async fn find_is_case_sensitive() -> Result<()> {
        let store = InMemoryCredentialStore::new();
        store.insert("Alice", "hash").await?;
        assert!(store.find_by_username("alice").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() -> Result<()> {
        let store = InMemoryCredentialStore::new();
        store.insert("bob", "one").await?;
        let second = store.insert("bob", "two").await;
        assert!(matches!(second, Err(StoreError::Conflict)));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn ids_are_unique() -> Result<()> {
        let store = InMemoryCredentialStore::new();
        let a = store.insert("a", "h").await?;
        let b = store.insert("b", "h").await?;
        assert_ne!(a.id, b.id);
        Ok(())
    }
}
