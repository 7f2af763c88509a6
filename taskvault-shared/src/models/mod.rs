/// Database models for TaskVault
///
/// # Models
///
/// - `user`: user accounts, roles and profile pictures
/// - `task`: per-user tasks with an encrypted security code
///
/// # Example
///
/// ```no_run
/// use taskvault_shared::models::user::{User, CreateUser};
/// use taskvault_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "alice".to_string(),
///     email: "alice@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod user;
pub mod task;
