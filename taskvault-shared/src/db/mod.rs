/// Database layer
///
/// - `pool`: PostgreSQL connection pool and health check
/// - `migrations`: embedded schema migrations and admin seeding
///
/// Row types and their queries live in [`crate::models`].

pub mod migrations;
pub mod pool;
