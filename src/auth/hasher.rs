//! Argon2id password hashing.

use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub trait Hasher: Send + Sync {
    /// Hash with a fresh random salt, PHC string output.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Constant-time check of `password` against a stored PHC string.
    /// `Ok(false)` on mismatch, `Err` only when the hash cannot be used.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError>;
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to initialize password hasher: {0}")]
    Initialization(String),

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is unusable: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub struct Argon2Hasher {
    params: Params,
    pepper: Option<SecretString>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new(Params::default(), None)
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new(params: Params, pepper: Option<SecretString>) -> Self {
        Self { params, pepper }
    }

    fn argon2(&self) -> Result<Argon2<'_>, HashError> {
        match &self.pepper {
            Some(pepper) => Argon2::new_with_secret(
                pepper.expose_secret().as_bytes(),
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            )
            .map_err(|e| HashError::Initialization(e.to_string())),
            None => Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            )),
        }
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| HashError::Malformed(e.to_string()))?;
        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Malformed(e.to_string())),
        }
    }
}
