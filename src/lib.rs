//! # StudySync (accounts and sessions)
//!
//! `studysync` is the account authority behind the StudySync study-planning
//! site. It handles signup, password login and server-side sessions.
//!
//! ## Accounts
//!
//! Usernames are trimmed, case-sensitive and unique. Uniqueness is enforced by
//! the database (`accounts_username_key`); the insert's conflict is the
//! authoritative rejection, so concurrent signups for one name cannot both win.
//!
//! ## Passwords
//!
//! Passwords are hashed with **Argon2id** and a fresh salt per hash, optionally
//! keyed with a server-side pepper. Hashing and verification run on the
//! blocking pool.
//!
//! ## Sessions
//!
//! A successful login issues a random 256-bit token in the `studysync_session`
//! cookie. Only the SHA-256 of the token is stored. Unknown usernames and wrong
//! passwords produce the same `Invalid credentials` answer.

pub mod auth;
pub mod cli;
pub mod session;
pub mod store;
pub mod studysync;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Current wall clock as unix seconds.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_now_unix_seconds_is_recent() {
        // 2020-01-01
        assert!(now_unix_seconds() > 1_577_836_800);
    }
}
