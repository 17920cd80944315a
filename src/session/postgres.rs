use super::{Session, SessionStore};
use crate::store::{classify_sqlx_error, StoreError};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        created_at_unix: row.try_get("created_at_unix")?,
        expires_at_unix: row.try_get("expires_at_unix")?,
    })
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, token_hash: &[u8], session: &Session) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, username, created_at, expires_at)
            VALUES ($1, $2, $3, TO_TIMESTAMP($4), TO_TIMESTAMP($5))
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .bind(session.user_id)
            .bind(&session.username)
            .bind(session.created_at_unix as f64)
            .bind(session.expires_at_unix as f64)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError> {
        let query = r"
            SELECT user_id, username,
                   EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
                   EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix
            FROM sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        row.as_ref()
            .map(session_from_row)
            .transpose()
            .map_err(classify_sqlx_error)
    }

    async fn invalidate(&self, token_hash: &[u8]) -> Result<bool, StoreError> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
