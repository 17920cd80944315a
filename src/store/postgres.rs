//! Postgres-backed credential store.

use super::{Account, CredentialStore, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgConnection, PgPool, Row};
use tracing::{debug, info_span, instrument, Instrument};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at_unix: row.try_get("created_at_unix")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let query = r"
            SELECT id, username, password_hash,
                   EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
            FROM accounts
            WHERE username = $1
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(classify_sqlx_error)
    }

    #[instrument(skip(self, password_hash))]
    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError> {
        // The unique constraint decides; there is no separate existence check here.
        let query = r"
            INSERT INTO accounts (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash,
                      EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(classify_sqlx_error)?;

        account_from_row(&row).map_err(classify_sqlx_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .map_err(classify_sqlx_error)?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .map_err(classify_sqlx_error)
    }
}

/// Postgres `unique_violation`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// SQLSTATEs meaning the database cannot serve us at all: connection
/// exceptions (08), bad credentials (28), missing database (3D) and a missing
/// table, which means the schema was never applied.
fn is_unavailable_code(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("28") || code.starts_with("3D") || code == "42P01"
}

/// Map a driver error onto the store taxonomy.
#[must_use]
pub fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict;
    }

    let unavailable = match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| is_unavailable_code(code.as_ref())),
        _ => false,
    };

    if unavailable {
        StoreError::Unavailable(err)
    } else {
        StoreError::Query(err)
    }
}

/// Create the `accounts` and `sessions` tables if they do not exist.
///
/// # Errors
/// Returns an error if the connection fails or a statement is rejected.
pub async fn apply_schema(dsn: &str) -> Result<()> {
    let mut connection = PgConnection::connect(dsn)
        .await
        .context("failed to connect for schema setup")?;

    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        debug!("applying schema statement {}", index + 1);
        sqlx::query(statement)
            .execute(&mut connection)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError { code: Some(code) }))
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        assert!(is_unique_violation(&db_error("23505")));
        assert!(!is_unique_violation(&db_error("99999")));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn classify_unique_violation_as_conflict() {
        assert!(matches!(
            classify_sqlx_error(db_error("23505")),
            StoreError::Conflict
        ));
    }

    #[test]
    fn classify_connection_problems_as_unavailable() {
        assert!(matches!(
            classify_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            classify_sqlx_error(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            classify_sqlx_error(sqlx::Error::Io(refused)),
            StoreError::Unavailable(_)
        ));
        for code in ["08006", "28P01", "3D000", "42P01"] {
            assert!(
                matches!(classify_sqlx_error(db_error(code)), StoreError::Unavailable(_)),
                "{code} should be unavailable"
            );
        }
    }

    #[test]
    fn classify_other_errors_as_query() {
        assert!(matches!(
            classify_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
        assert!(matches!(
            classify_sqlx_error(db_error("22001")),
            StoreError::Query(_)
        ));
    }

    #[test]
    fn classify_decode_failures_as_query() {
        assert!(matches!(
            classify_sqlx_error(sqlx::Error::ColumnNotFound("created_at_unix".to_string())),
            StoreError::Query(_)
        ));
    }

    #[test]
    fn split_schema_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 4);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS accounts"));
        assert!(statements[0].contains("UNIQUE (username)"));
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS sessions"));
        assert!(statements.iter().all(|s| s.ends_with(';')));
    }

    #[test]
    fn split_skips_comments_and_keeps_leftover() {
        let statements = split_sql_statements("-- header\nSELECT 1;\n\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }
}
