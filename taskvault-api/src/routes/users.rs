/// User profile endpoints
///
/// - `GET /api/v1/users` - List every user (admin only)
/// - `GET /api/v1/users/:id` - Read a profile (self or admin)
/// - `PUT /api/v1/users/:id` - Partially update a profile (self or admin)
/// - `DELETE /api/v1/users/:id` - Delete an account (self or admin)
///
/// Single-user reads go through the cache; writes refresh or drop the
/// `user:<id>` entry after the database write commits.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
    response::ApiResponse,
    routes::{
        auth::{validate_email_domain, validate_username},
        deny, parse_id,
    },
};
use axum::extract::{Extension, Path, State};
use serde::Deserialize;
use taskvault_shared::{
    auth::{
        authorization::{authorize_user, require_admin},
        middleware::AuthContext,
        password,
    },
    models::user::{UpdateUser, User},
};
use validator::Validate;

const INVALID_USER_ID: &str = "Invalid user ID";
const USER_NOT_FOUND: &str = "User not found";

/// Partial profile update; absent fields are left untouched
///
/// Present fields follow the registration rules.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, message = "Username must not be empty"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(
        email(message = "Invalid email format"),
        custom(function = "validate_email_domain")
    )]
    pub email: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: Option<String>,
}

/// List all users
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    require_admin(&auth).map_err(|e| deny(&auth, e, "Forbidden"))?;

    let users = User::list(&state.db).await?;

    tracing::info!(target: "audit", user_id = auth.user_id, count = users.len(), "Users listed");
    Ok(ApiResponse::ok("Users fetched successfully", users))
}

/// Get one user
///
/// Access is checked against the path id before any lookup, so a denied
/// caller learns nothing about whether the user exists.
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id
/// - `403 Forbidden`: Neither self nor admin
/// - `404 Not Found`: No such user
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<User>> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    authorize_user(&auth, id).map_err(|e| deny(&auth, e, "Forbidden"))?;

    let fetched = state
        .cache
        .get(id, || User::find_by_id(&state.db, id))
        .await
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;

    let message = if fetched.from_cache() {
        "User found (from cache)"
    } else {
        "User found"
    };

    tracing::info!(target: "audit", user_id = auth.user_id, target_id = id, "User read");
    Ok(ApiResponse::ok(message, fetched.value))
}

/// Update a user
///
/// A new password is hashed before storage. The refreshed user replaces the
/// cache entry.
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id, malformed body or invalid field
/// - `403 Forbidden`: Neither self nor admin
/// - `404 Not Found`: No such user
/// - `409 Conflict`: Username or email taken
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateUserRequest>, ApiError>,
) -> ApiResult<ApiResponse<User>> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    authorize_user(&auth, id)
        .map_err(|e| deny(&auth, e, "You don't have permission to update this user"))?;

    let ApiJson(req) = body?;
    req.validate()?;

    let password_hash = match req.password.as_deref() {
        Some(plain) => Some(password::hash_password(plain)?),
        None => None,
    };

    let changes = UpdateUser {
        username: req.username,
        email: req.email,
        password_hash,
    };

    let user = state
        .cache
        .put(async {
            User::update(&state.db, id, changes)
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
        })
        .await?;

    tracing::info!(target: "audit", user_id = auth.user_id, target_id = id, "User updated");
    Ok(ApiResponse::ok("User updated successfully", user))
}

/// Delete a user
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id
/// - `403 Forbidden`: Neither self nor admin
/// - `404 Not Found`: No such user
/// - `409 Conflict`: User still owns tasks
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    authorize_user(&auth, id)
        .map_err(|e| deny(&auth, e, "You don't have permission to delete this user"))?;

    let deleted = User::delete(&state.db, id).await.map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            ApiError::Conflict("User still owns tasks".to_string())
        }
        _ => ApiError::from(e),
    })?;

    if !deleted {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }

    state.cache.invalidate::<User>(id).await;

    tracing::info!(target: "audit", user_id = auth.user_id, target_id = id, "User deleted");
    Ok(ApiResponse::message("User deleted successfully"))
}
