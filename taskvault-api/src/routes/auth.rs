/// Authentication endpoints
///
/// - `POST /api/v1/register` - Register a member account
/// - `POST /api/v1/login` - Exchange credentials for a bearer token

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
    response::ApiResponse,
    routes::CreatedId,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use taskvault_shared::{
    auth::{
        jwt::{self, Claims},
        password,
    },
    models::user::{CreateUser, Role, User},
};
use validator::{Validate, ValidationError};

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Login name; must not contain `@` or `?`
    #[validate(
        length(min = 1, message = "Username is required"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        email(message = "Invalid email format"),
        custom(function = "validate_email_domain")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i32,
    pub role: Role,

    /// HS256 bearer token
    pub token: String,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.contains(['@', '?']) {
        return Err(invalid(
            "username_chars",
            "Username must not contain '@' or '?'",
        ));
    }
    Ok(())
}

/// Requires a dot somewhere in the address
pub(crate) fn validate_email_domain(email: &str) -> Result<(), ValidationError> {
    if !email.contains('.') {
        return Err(invalid("email_domain", "Invalid email format"));
    }
    Ok(())
}

/// Register a new member account
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/register
/// Content-Type: application/json
///
/// { "username": "alice", "email": "alice@x.com", "password": "secret1" }
/// ```
///
/// # Response
///
/// ```json
/// { "message": "User created successfully", "success": true, "status": 201, "data": { "id": 1 } }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body or validation failed
/// - `409 Conflict`: Username or email already exists
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<ApiResponse<CreatedId>> {
    req.validate()?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username.clone(),
            email: req.email,
            password_hash,
        },
    )
    .await
    .map_err(|e| {
        let err = ApiError::from(e);
        if matches!(err, ApiError::Conflict(_)) {
            tracing::warn!(target: "security", username = %req.username, "Duplicate registration");
        }
        err
    })?;

    tracing::info!(target: "audit", user_id = user.id, "User registered");

    Ok(ApiResponse::created(
        "User created successfully",
        CreatedId { id: user.id },
    ))
}

/// Log in with username and password
///
/// The token carries `{user_id, role, exp}` and is valid for the configured
/// lifetime (one hour by default). Unknown users and wrong passwords get the
/// same response.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body or missing fields
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<ApiResponse<LoginResponse>> {
    req.validate()?;

    let invalid_credentials = || ApiError::Unauthorized("Invalid credentials".to_string());

    let credentials = match User::find_credentials_by_username(&state.db, &req.username).await? {
        Some(credentials) => credentials,
        None => {
            tracing::warn!(target: "security", username = %req.username, "Login for unknown user");
            return Err(invalid_credentials());
        }
    };

    if !password::verify_password(&req.password, &credentials.password_hash)? {
        tracing::warn!(target: "security", user_id = credentials.id, "Login with wrong password");
        return Err(invalid_credentials());
    }

    let ttl = chrono::Duration::seconds(state.config.jwt.ttl.as_secs() as i64);
    let claims = Claims::with_expiration(credentials.id, credentials.role, ttl);
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(target: "audit", user_id = credentials.id, role = %credentials.role, "Login success");

    Ok(ApiResponse::ok(
        "Login success",
        LoginResponse {
            user_id: credentials.id,
            role: credentials.role,
            token,
        },
    ))
}
