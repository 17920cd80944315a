use super::{
    session::{extract_session_token, session_cookie},
    types::{AuthParams, AuthResponse},
};
use crate::auth::{AuthError, AuthService, ValidationError};
use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Extension, Form, Query,
    },
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::{fmt::Display, sync::Arc};
use tracing::{debug, error, instrument};

pub const MSG_ACCOUNT_CREATED: &str = "Account created";
pub const MSG_LOGGED_IN: &str = "Logged in";
pub const MSG_UNSUPPORTED_ACTION: &str = "Unsupported action";

#[utoipa::path(
    post,
    path = "/auth",
    request_body(
        content = AuthParams,
        content_type = "application/x-www-form-urlencoded",
        description = "`action` (signup | login), `username`, `password`; query parameters are accepted too"
    ),
    responses(
        (status = 200, description = "Outcome of the action; check `success`", body = AuthResponse, content_type = "application/json"),
        (status = 500, description = "Credential store unavailable or internal failure", body = AuthResponse, content_type = "application/json"),
    ),
    tag = "auth"
)]
// axum handler for signup and login, selected by `action`
#[instrument(skip_all)]
pub async fn auth(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    query: Result<Query<AuthParams>, QueryRejection>,
    form: Result<Form<AuthParams>, FormRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return malformed(&rejection),
    };
    let form = match form {
        Ok(Form(form)) => Some(form),
        // POST without a form body, parameters come from the query string only
        Err(FormRejection::InvalidFormContentType(_)) => None,
        Err(rejection) => return malformed(&rejection),
    };
    let params = AuthParams::merge(Some(query), form);

    debug!("params: {:?}", params);

    match params.action.as_deref() {
        Some("signup") => signup(&service, params).await,
        Some("login") => login(&service, &headers, params).await,
        _ => reply(StatusCode::OK, AuthResponse::failure(MSG_UNSUPPORTED_ACTION)),
    }
}

async fn signup(service: &AuthService, params: AuthParams) -> Response {
    let credentials = match params.into_credentials() {
        Ok(credentials) => credentials,
        Err(err) => return failure(&err),
    };

    match service.signup(credentials).await {
        Ok(_) => reply(StatusCode::OK, AuthResponse::success(MSG_ACCOUNT_CREATED)),
        Err(err) => failure(&err),
    }
}

async fn login(service: &AuthService, headers: &HeaderMap, params: AuthParams) -> Response {
    let credentials = match params.into_credentials() {
        Ok(credentials) => credentials,
        Err(err) => return failure(&err),
    };

    let previous = extract_session_token(headers);

    match service.login(credentials, previous.as_deref()).await {
        Ok(issued) => {
            let mut response_headers = HeaderMap::new();
            match session_cookie(service.config(), &issued.token) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        AuthResponse::failure(crate::auth::MSG_INTERNAL),
                    );
                }
            }
            (
                StatusCode::OK,
                response_headers,
                Json(AuthResponse::success(MSG_LOGGED_IN)),
            )
                .into_response()
        }
        Err(err) => failure(&err),
    }
}

/// Duplicate keys or undecodable bytes: the fields cannot be trusted.
fn malformed(rejection: &impl Display) -> Response {
    debug!("malformed auth parameters: {rejection}");
    failure(&AuthError::Validation(ValidationError::MissingFields))
}

fn failure(err: &AuthError) -> Response {
    let status = if err.is_server_fault() {
        error!("auth request failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        debug!("auth request rejected: {err}");
        StatusCode::OK
    };
    reply(status, AuthResponse::failure(err.public_message()))
}

fn reply(status: StatusCode, body: AuthResponse) -> Response {
    (status, Json(body)).into_response()
}
