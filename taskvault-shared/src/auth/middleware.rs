/// Bearer-token authentication middleware for Axum
///
/// Resolves the caller's identity from the `Authorization` header and adds an
/// [`AuthContext`] to request extensions. The gate trusts the token's claims:
/// no database lookup is made, so a deleted user keeps access until the token
/// expires.
///
/// Every rejection is `401 Unauthorized` with a reason-specific message,
/// rendered in the same `{message, success, status}` envelope as the rest of
/// the API.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware, Extension};
/// use taskvault_shared::auth::middleware::{create_jwt_middleware, AuthContext};
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn(create_jwt_middleware("secret")));
/// ```

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::jwt::{verify_token_at, JwtError};
use crate::models::user::Role;

/// Authentication context added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: i32,

    /// Role carried by the token
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Error type for authentication middleware
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("No token provided")]
    MissingCredentials,

    /// Header is not `Bearer <token>`
    #[error("Invalid token format")]
    InvalidFormat,

    /// Token verification failed
    #[error("{0}")]
    InvalidToken(#[from] JwtError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "message": self.to_string(),
            "success": false,
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

/// Resolves an `Authorization` header value into an [`AuthContext`]
///
/// Checks run in a fixed order: presence, `Bearer <token>` shape (exactly one
/// space-separated token), then the token chain of
/// [`verify_token_at`](super::jwt::verify_token_at).
///
/// # Example
///
/// ```
/// use taskvault_shared::auth::middleware::{authenticate, AuthError};
///
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// assert_eq!(authenticate(None, secret, 0), Err(AuthError::MissingCredentials));
/// assert_eq!(authenticate(Some("Token abc"), secret, 0), Err(AuthError::InvalidFormat));
/// ```
pub fn authenticate(header: Option<&str>, secret: &str, now: i64) -> Result<AuthContext, AuthError> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or(AuthError::MissingCredentials)?;

    let token = match header.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] => *token,
        _ => return Err(AuthError::InvalidFormat),
    };

    let claims = verify_token_at(token, secret, now)?;

    Ok(AuthContext::new(claims.user_id, claims.role))
}

/// JWT authentication middleware
///
/// # Errors
///
/// Returns 401 Unauthorized if the header is missing or malformed, or the
/// token fails verification.
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidFormat)?),
        None => None,
    };

    let auth_context = authenticate(header_value, &secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(target: "security", reason = %e, path = %req.uri().path(), "Rejected bearer token");
        e
    })?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Creates a JWT authentication middleware closure
///
/// Captures the secret and returns a function usable with
/// `axum::middleware::from_fn`.
pub fn create_jwt_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(jwt_auth_middleware(secret, req, next))
    }
}
