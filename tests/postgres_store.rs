//! Storage tests against a live Postgres.
//!
//! Set `STUDYSYNC_TEST_DSN` to a database the tests may create tables in;
//! without it every test here is skipped. Usernames carry a ULID so runs
//! against the same database do not collide.

use anyhow::{Context, Result};
use argon2::Params;
use secrecy::SecretString;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc};
use studysync::{
    auth::{Argon2Hasher, AuthConfig, AuthError, AuthService, Credentials},
    now_unix_seconds,
    session::{hash_session_token, PgSessionStore, Session, SessionStore},
    store::{apply_schema, Account, CredentialStore, PgCredentialStore, StoreError},
};
use tokio::sync::OnceCell;
use ulid::Ulid;

const TEST_DSN_ENV: &str = "STUDYSYNC_TEST_DSN";

// Concurrent CREATE TABLE IF NOT EXISTS can still collide in pg_type.
static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = env::var(TEST_DSN_ENV) else {
        eprintln!("Skipping Postgres test: {TEST_DSN_ENV} is not set");
        return Ok(None);
    };

    SCHEMA
        .get_or_try_init(|| async {
            // Applying twice checks the schema stays idempotent.
            apply_schema(&dsn).await?;
            apply_schema(&dsn).await
        })
        .await?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("failed to connect test pool")?;

    Ok(Some(pool))
}

fn unique_username(prefix: &str) -> String {
    format!("{prefix}-{}", Ulid::new())
}

#[tokio::test]
async fn insert_and_find_account() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let store = PgCredentialStore::new(pool);
    let username = unique_username("alice");

    assert!(store.find_by_username(&username).await?.is_none());

    let account = store.insert(&username, "$argon2id$fake").await?;
    assert!(account.id > 0);
    assert_eq!(account.username, username);
    assert!((account.created_at_unix - now_unix_seconds()).abs() < 60);

    let found = store
        .find_by_username(&username)
        .await?
        .context("inserted account should be found")?;
    assert_eq!(found.id, account.id);
    assert_eq!(found.password_hash, "$argon2id$fake");

    // Exact match only.
    assert!(store
        .find_by_username(&username.to_uppercase())
        .await?
        .is_none());

    assert!(matches!(
        store.insert(&username, "$argon2id$other").await,
        Err(StoreError::Conflict)
    ));
    store.ping().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_have_one_winner() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let store = Arc::new(PgCredentialStore::new(pool));
    let username = unique_username("bob");

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            let username = username.clone();
            tokio::spawn(async move { store.insert(&username, &format!("hash-{i}")).await })
        })
        .collect();

    let mut results: Vec<Result<Account, StoreError>> = Vec::new();
    for handle in handles {
        results.push(handle.await?);
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict)))
            .count(),
        3
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_signups_through_the_service() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let service = Arc::new(AuthService::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool)),
        Arc::new(Argon2Hasher::new(Params::new(8, 1, 1, None)?, None)),
        AuthConfig::new(),
    ));
    let username = unique_username("carol");

    let handles: Vec<_> = ["p1", "p2"]
        .into_iter()
        .map(|password| {
            let service = Arc::clone(&service);
            let username = username.clone();
            tokio::spawn(async move {
                let credentials =
                    Credentials::new(&username, SecretString::from(password.to_string()))?;
                service.signup(credentials).await
            })
        })
        .collect();

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => winners += 1,
            Err(AuthError::Conflict) => conflicts += 1,
            Err(err) => return Err(err.into()),
        }
    }
    assert_eq!((winners, conflicts), (1, 1));
    Ok(())
}

#[tokio::test]
async fn session_lifecycle() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let accounts = PgCredentialStore::new(pool.clone());
    let sessions = PgSessionStore::new(pool);
    let account = accounts.insert(&unique_username("dave"), "hash").await?;
    let now = now_unix_seconds();

    let live_hash = hash_session_token(&Ulid::new().to_string());
    let live = Session {
        user_id: account.id,
        username: account.username.clone(),
        created_at_unix: now,
        expires_at_unix: now + 600,
    };
    sessions.create(&live_hash, &live).await?;

    let found = sessions
        .lookup(&live_hash)
        .await?
        .context("live session should resolve")?;
    assert_eq!(found, live);

    let expired_hash = hash_session_token(&Ulid::new().to_string());
    let expired = Session {
        expires_at_unix: now - 1,
        ..live.clone()
    };
    sessions.create(&expired_hash, &expired).await?;
    assert!(sessions.lookup(&expired_hash).await?.is_none());

    assert!(sessions.purge_expired().await? >= 1);
    assert!(!sessions.invalidate(&expired_hash).await?);

    assert!(sessions.invalidate(&live_hash).await?);
    assert!(sessions.lookup(&live_hash).await?.is_none());

    sessions.create(&live_hash, &live).await?;
    assert_eq!(sessions.invalidate_user(account.id).await?, 1);
    Ok(())
}
