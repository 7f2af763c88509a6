/// API route handlers
///
/// Organized by resource:
///
/// - `health`: health check endpoint
/// - `auth`: registration and login
/// - `users`: user profiles
/// - `tasks`: tasks with encrypted security codes
/// - `uploads`: file and profile picture uploads

pub mod auth;
pub mod health;
pub mod tasks;
pub mod uploads;
pub mod users;

use crate::error::{ApiError, ApiResult};
use serde::Serialize;
use taskvault_shared::auth::authorization::AuthzError;
use taskvault_shared::auth::middleware::AuthContext;

/// Payload for endpoints that only report a new row's id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedId {
    pub id: i32,
}

/// Parses a numeric path id, rejecting anything else with `message`
pub(crate) fn parse_id(raw: &str, message: &str) -> ApiResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| ApiError::BadRequest(message.to_string()))
}

/// Logs a policy denial and turns it into a 403 with `message`
pub(crate) fn deny(auth: &AuthContext, err: AuthzError, message: &str) -> ApiError {
    tracing::warn!(
        target: "security",
        user_id = auth.user_id,
        role = %auth.role,
        reason = %err,
        "Access denied"
    );
    ApiError::Forbidden(message.to_string())
}
