/// Schema migrations and first-run setup
///
/// Migrations live in `taskvault-shared/migrations/` and are embedded into the
/// binary by `sqlx::migrate!`, so the server brings its own schema up to date
/// on start.
///
/// # Example
///
/// ```no_run
/// use taskvault_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskvault_shared::db::migrations::{run_migrations, seed_admin};
/// use taskvault_shared::auth::password::hash_password;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     })
///     .await?;
///
///     run_migrations(&pool).await?;
///     seed_admin(&pool, &hash_password("change-me")?).await?;
///
///     Ok(())
/// }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied
    pub applied_migrations: usize,

    /// Latest applied migration version (timestamp)
    pub latest_version: Option<i64>,

    /// Whether the database schema is up to date
    pub is_up_to_date: bool,
}

/// Applies every pending migration
///
/// Each migration runs in its own transaction; a failing one is rolled back
/// and stops the run.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    let migrations = sqlx::migrate!("./migrations");

    match migrations.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Reports which embedded migrations have been applied
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    debug!("Checking migration status");

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: sqlx::migrate!("./migrations").iter().next().is_none(),
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT
            COUNT(*) as count,
            MAX(version) as latest_version
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    debug!(
        applied_migrations = count,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    let embedded = sqlx::migrate!("./migrations");
    let expected = embedded.iter().map(|m| m.version).max();

    Ok(MigrationStatus {
        applied_migrations: count as usize,
        latest_version,
        is_up_to_date: latest_version == expected,
    })
}

/// Creates the database named in the URL when it is missing
///
/// Needs a role allowed to `CREATE DATABASE`; meant for development and the
/// integration tests.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    info!("Checking if database exists");

    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
        info!("Database created successfully");
    } else {
        debug!("Database already exists");
    }

    Ok(())
}

/// Username of the seeded administrator
pub const ADMIN_USERNAME: &str = "admin";

/// Email of the seeded administrator
pub const ADMIN_EMAIL: &str = "admin@mail.com";

/// Ensures the `admin` account exists
///
/// Takes an already hashed password. An existing `admin` row is left
/// untouched, including its password.
///
/// # Returns
///
/// True if the account was created by this call
pub async fn seed_admin(pool: &PgPool, password_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role)
        VALUES ($1, $2, $3, 'admin')
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(ADMIN_USERNAME)
    .bind(ADMIN_EMAIL)
    .bind(password_hash)
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;
    if created {
        info!(username = ADMIN_USERNAME, "Admin user created");
    } else {
        debug!("Admin user already present");
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_ordered() {
        let migrator = sqlx::migrate!("./migrations");
        let versions: Vec<i64> = migrator.iter().map(|m| m.version).collect();

        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_schema_declares_enums() {
        let migrator = sqlx::migrate!("./migrations");
        let sql: String = migrator.iter().map(|m| m.sql.as_ref()).collect();

        assert!(sql.contains("'admin', 'member'"));
        assert!(sql.contains("'pending', 'in_progress', 'completed'"));
        assert!(sql.contains("REFERENCES users(id)"));
    }
}
