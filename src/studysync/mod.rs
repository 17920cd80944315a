use crate::{
    auth::{Argon2Hasher, AuthConfig, AuthService},
    session::PgSessionStore,
    store::PgCredentialStore,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::interval};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, info, info_span, warn, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::auth,
        handlers::session::session,
        handlers::session::logout
    ),
    components(schemas(
        handlers::health::Health,
        handlers::types::AuthParams,
        handlers::types::AuthResponse,
        handlers::types::SessionResponse
    )),
    tags(
        (name = "studysync", description = "StudySync accounts and sessions API")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the HTTP router around an [`AuthService`].
pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/", get(|| async { "📚" }))
        .route("/auth", get(handlers::auth).post(handlers::auth))
        .route("/session", get(handlers::session))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health).options(handlers::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(service)),
        )
}

/// Start the server
/// # Errors
/// Return error if the DSN is invalid or the listener cannot be bound
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    hasher: Argon2Hasher,
) -> Result<()> {
    // Lazy pool: an unreachable database fails requests, not the process.
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect_lazy(&dsn)
        .context("Invalid database connection string")?;

    // Construction hashes the timing dummy, a full Argon2 run.
    let service = tokio::task::spawn_blocking(move || {
        AuthService::new(
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool)),
            Arc::new(hasher),
            auth_config,
        )
    })
    .await
    .context("Failed to build the auth service")?;
    let service = Arc::new(service);

    if let Err(err) = service.ping().await {
        warn!("Database is not reachable yet: {err}");
    }

    spawn_session_purger(Arc::clone(&service));

    let app = router(service);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn spawn_session_purger(service: Arc<AuthService>) {
    let mut purge_interval = interval(SESSION_PURGE_INTERVAL);

    tokio::spawn(async move {
        loop {
            purge_interval.tick().await;

            match service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {} expired sessions", purged),
                Err(err) => warn!("Failed to purge expired sessions: {err}"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_route() {
        let doc = openapi();
        for path in ["/auth", "/session", "/logout", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
