//! Request/response types for the HTTP surface.

use crate::auth::{AuthError, Credentials};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Parameters accepted by `/auth`, from the query string or a form body.
#[derive(ToSchema, Deserialize, Default)]
pub struct AuthParams {
    pub action: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthParams")
            .field("action", &self.action)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthParams {
    /// Combine query and body parameters.
    ///
    /// `action` prefers the query string; credentials prefer the body.
    #[must_use]
    pub fn merge(query: Option<Self>, body: Option<Self>) -> Self {
        let query = query.unwrap_or_default();
        let body = body.unwrap_or_default();
        Self {
            action: query.action.or(body.action),
            username: body.username.or(query.username),
            password: body.password.or(query.password),
        }
    }

    /// Validate the credential fields. Missing fields count as empty.
    ///
    /// # Errors
    /// [`AuthError::Validation`] when a field is missing, empty or too long.
    pub fn into_credentials(self) -> Result<Credentials, AuthError> {
        let username = self.username.unwrap_or_default();
        let password = SecretString::from(self.password.unwrap_or_default());
        Credentials::new(&username, password)
    }
}

/// The uniform `{success, message}` answer of `/auth`.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

impl AuthResponse {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: i64,
    pub username: String,
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, ValidationError};
    use anyhow::Result;

    fn params(action: Option<&str>, username: Option<&str>, password: Option<&str>) -> AuthParams {
        AuthParams {
            action: action.map(str::to_string),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn merge_prefers_query_action_and_body_fields() {
        let merged = AuthParams::merge(
            Some(params(Some("login"), Some("query-user"), None)),
            Some(params(Some("signup"), Some("body-user"), Some("pw"))),
        );
        assert_eq!(merged.action.as_deref(), Some("login"));
        assert_eq!(merged.username.as_deref(), Some("body-user"));
        assert_eq!(merged.password.as_deref(), Some("pw"));
    }

    #[test]
    fn merge_falls_back_to_the_other_source() {
        let merged = AuthParams::merge(
            Some(params(None, Some("alice"), Some("pw"))),
            Some(params(Some("signup"), None, None)),
        );
        assert_eq!(merged.action.as_deref(), Some("signup"));
        assert_eq!(merged.username.as_deref(), Some("alice"));

        let empty = AuthParams::merge(None, None);
        assert!(empty.action.is_none());
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        let result = params(Some("login"), Some("alice"), None).into_credentials();
        assert!(matches!(
            result,
            Err(AuthError::Validation(ValidationError::MissingFields))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", params(Some("login"), Some("alice"), Some("hunter2")));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn auth_response_serializes_success_and_message() -> Result<()> {
        let value = serde_json::to_value(AuthResponse::failure("Missing fields"))?;
        assert_eq!(
            value,
            serde_json::json!({"success": false, "message": "Missing fields"})
        );
        Ok(())
    }
}
