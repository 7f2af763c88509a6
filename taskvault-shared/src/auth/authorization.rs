/// Resource-level authorization checks
///
/// Pure policy functions over an [`AuthContext`]. They never touch the
/// database: callers fetch the resource (or its owner id) first and pass the
/// relevant id in.
///
/// # Policy
///
/// | Resource | Allowed |
/// |---|---|
/// | task | owner or admin |
/// | user profile | self or admin |
/// | user list | admin only |
///
/// # Example
///
/// ```
/// use taskvault_shared::auth::authorization::{authorize_task, require_admin};
/// use taskvault_shared::auth::middleware::AuthContext;
/// use taskvault_shared::models::user::Role;
///
/// let member = AuthContext::new(2, Role::Member);
///
/// assert!(authorize_task(&member, 2).is_ok());
/// assert!(authorize_task(&member, 3).is_err());
/// assert!(require_admin(&member).is_err());
/// ```

use super::middleware::AuthContext;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller is neither the owner nor an admin
    #[error("Access denied")]
    NotOwner,

    /// Endpoint is restricted to admins
    #[error("Admin access required")]
    AdminRequired,
}

/// Allows the task's owner or any admin
pub fn authorize_task(auth: &AuthContext, owner_id: i32) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.user_id == owner_id {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

/// Allows the user themselves or any admin
pub fn authorize_user(auth: &AuthContext, target_id: i32) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.user_id == target_id {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}
