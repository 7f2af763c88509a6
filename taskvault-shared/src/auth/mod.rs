/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: bearer token issuing and verification
/// - [`middleware`]: the Axum authentication gate and [`middleware::AuthContext`]
/// - [`authorization`]: ownership and role policy checks
///
/// # Example
///
/// ```no_run
/// use taskvault_shared::auth::password::{hash_password, verify_password};
/// use taskvault_shared::auth::jwt::{create_token, Claims};
/// use taskvault_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let token = create_token(&Claims::new(1, Role::Member), "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod password;
pub mod jwt;
pub mod middleware;
pub mod authorization;
