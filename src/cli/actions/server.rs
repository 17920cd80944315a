use crate::{
    auth::{Argon2Hasher, AuthConfig},
    studysync,
};
use anyhow::Result;
use argon2::Params;
use secrecy::SecretString;
use tracing::info;
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub password_pepper: Option<SecretString>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &redact_dsn(&self.dsn))
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("password_pepper_set", &self.password_pepper.is_some())
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure);

    let hasher = Argon2Hasher::new(Params::default(), args.password_pepper);

    studysync::new(args.port, args.dsn, auth_config, hasher).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        (
            "session_cookie_secure",
            args.session_cookie_secure.to_string(),
        ),
        ("password_pepper_set", args.password_pepper.is_some().to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "studysync {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

pub(crate) fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
