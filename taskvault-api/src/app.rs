/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskvault_api::{app::{build_router, AppState}, config::Config};
/// use taskvault_shared::cache::{EntityCache, MemoryCache};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let cache = EntityCache::new(Arc::new(MemoryCache::new()), config.cache.ttl);
///
/// let app = build_router(AppState::new(pool, cache, config));
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ErrorResponse, INTERNAL_ERROR_MESSAGE},
    middleware::rate_limit::{rate_limit_middleware, RateLimiter},
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sqlx::PgPool;
use std::any::Any;
use std::sync::Arc;
use taskvault_shared::auth::middleware::create_jwt_middleware;
use taskvault_shared::cache::EntityCache;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Cache-aside layer over users and tasks
    pub cache: EntityCache,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, cache: EntityCache, config: Config) -> Self {
        Self {
            db,
            cache,
            config: Arc::new(config),
        }
    }

    /// Secret used to sign and verify tokens
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Key for the security code cipher
    pub fn encryption_key(&self) -> &str {
        &self.config.encryption_key
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # public
/// └── /api/v1/
///     ├── POST /register                   # public
///     ├── POST /login                      # public
///     ├── GET  /users                      # admin
///     ├── GET|PUT|DELETE /users/:id        # self or admin
///     ├── GET|POST /tasks
///     ├── GET|PUT|DELETE /tasks/:id        # owner or admin
///     ├── POST /upload
///     ├── POST /upload/profile_picture
///     └── GET  /upload/:filename
/// ```
///
/// # Middleware Stack
///
/// Outermost first: panic recovery, CORS, tracing, compression, rate
/// limit, request timeout, then bearer authentication on the protected
/// routes only.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let public_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/upload", post(routes::uploads::upload_file))
        .route(
            "/upload/profile_picture",
            post(routes::uploads::upload_profile_picture),
        )
        .route("/upload/:filename", get(routes::uploads::get_file))
        .layer(DefaultBodyLimit::max(
            config.upload.max_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .route_layer(middleware::from_fn(create_jwt_middleware(
            config.jwt.secret.clone(),
        )));

    let v1_routes = public_routes.merge(protected_routes);

    let rate_limiter = RateLimiter::per_minute(config.api.rate_limit_per_minute);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", v1_routes)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    rate_limiter,
                    rate_limit_middleware,
                ))
                .layer(TimeoutLayer::new(config.api.request_timeout)),
        )
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&config.api.cors_origins))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// CORS: any origin when none are configured, otherwise the listed ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        return base.allow_origin(AnyOrigin);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    base.allow_origin(origins)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Turns a handler panic into the generic 500 envelope
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        Json(ErrorResponse {
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            success: false,
            status: status.as_u16(),
            errors: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let response = handle_panic(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 500);
    }

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["http://localhost:3000".to_string()]);
    }
}
