use super::{AuthConfig, AuthError, Credentials, HashError, Hasher};
use crate::{
    now_unix_seconds,
    session::{generate_session_token, hash_session_token, IssuedSession, Session, SessionStore},
    store::{Account, CredentialStore},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// Verified against when the username is unknown, so both paths cost one hash.
const TIMING_DUMMY_PASSWORD: &str = "studysync-timing-equalizer";

pub struct AuthService {
    accounts: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn Hasher>,
    config: AuthConfig,
    dummy_hash: Option<Arc<str>>,
}

impl AuthService {
    /// Builds the service and hashes the timing dummy up front, which costs
    /// one full Argon2 hash; call it off the async workers.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn Hasher>,
        config: AuthConfig,
    ) -> Self {
        let dummy_hash = match hasher.hash(TIMING_DUMMY_PASSWORD) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(err) => {
                warn!("failed to prepare timing dummy hash: {err}");
                None
            }
        };

        Self {
            accounts,
            sessions,
            hasher,
            config,
            dummy_hash,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account.
    ///
    /// # Errors
    /// [`AuthError::Conflict`] when the username is taken, either by the
    /// pre-check or by the store rejecting the insert.
    #[instrument(skip_all, fields(username = %credentials.username()))]
    pub async fn signup(&self, credentials: Credentials) -> Result<Account, AuthError> {
        // Early answer only; the insert below is what actually guarantees uniqueness.
        if self
            .accounts
            .find_by_username(credentials.username())
            .await?
            .is_some()
        {
            debug!("username already taken");
            return Err(AuthError::Conflict);
        }

        let (username, password) = credentials.into_parts();
        let hasher = Arc::clone(&self.hasher);
        let password_hash =
            run_blocking(move || hasher.hash(password.expose_secret())).await??;

        let account = match self.accounts.insert(&username, &password_hash).await {
            Ok(account) => account,
            Err(err) => {
                let err = AuthError::from(err);
                if matches!(err, AuthError::Conflict) {
                    debug!("lost signup race for username");
                }
                return Err(err);
            }
        };

        info!(user_id = account.id, "account created");

        Ok(account)
    }

    /// Verify credentials and issue a session.
    ///
    /// `replaces` is a token the client already held; it is invalidated once
    /// the new session exists.
    ///
    /// # Errors
    /// [`AuthError::Authentication`] for an unknown username or a wrong
    /// password, without telling the two apart.
    #[instrument(skip_all, fields(username = %credentials.username()))]
    pub async fn login(
        &self,
        credentials: Credentials,
        replaces: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let account = self
            .accounts
            .find_by_username(credentials.username())
            .await?;

        let (_, password) = credentials.into_parts();
        let stored_hash = account.as_ref().map(|a| a.password_hash.clone());
        let hasher = Arc::clone(&self.hasher);
        let dummy_hash = self.dummy_hash.clone();

        let verified = run_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(password.expose_secret(), &hash),
            None => {
                if let Some(dummy) = dummy_hash {
                    let _ = hasher.verify(password.expose_secret(), &dummy);
                }
                Ok(false)
            }
        })
        .await?;

        let verified = match verified {
            Ok(verified) => verified,
            Err(HashError::Malformed(err)) => {
                error!("stored password hash is unusable: {err}");
                false
            }
            Err(err) => return Err(err.into()),
        };

        let account = match account {
            Some(account) if verified => account,
            _ => {
                debug!("invalid credentials");
                return Err(AuthError::Authentication);
            }
        };

        let issued = self.issue_session(&account).await?;

        if let Some(previous) = replaces {
            if let Err(err) = self.sessions.invalidate(&hash_session_token(previous)).await {
                warn!("failed to invalidate replaced session: {err}");
            }
        }

        info!(user_id = account.id, "session issued");

        Ok(issued)
    }

    async fn issue_session(&self, account: &Account) -> Result<IssuedSession, AuthError> {
        let token = generate_session_token().map_err(|e| AuthError::Internal(e.to_string()))?;
        let now = now_unix_seconds();
        let session = Session {
            user_id: account.id,
            username: account.username.clone(),
            created_at_unix: now,
            expires_at_unix: now.saturating_add(self.config.session_ttl_seconds()),
        };

        self.sessions
            .create(&hash_session_token(&token), &session)
            .await?;

        Ok(IssuedSession { token, session })
    }

    /// Resolve a client token into its unexpired session.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn current_session(&self, token: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.lookup(&hash_session_token(token)).await?)
    }

    /// Returns whether a session was removed.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self.sessions.invalidate(&hash_session_token(token)).await?;
        debug!(removed, "logout");
        Ok(removed)
    }

    /// Invalidate every session of an account.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn logout_everywhere(&self, user_id: i64) -> Result<u64, AuthError> {
        Ok(self.sessions.invalidate_user(user_id).await?)
    }

    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        Ok(self.sessions.purge_expired().await?)
    }

    /// # Errors
    /// Returns an error if the credential store cannot be reached.
    pub async fn ping(&self) -> Result<(), AuthError> {
        Ok(self.accounts.ping().await?)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))
}
