/// Configuration management for the API server
///
/// Loaded once at startup from environment variables (a `.env` file is
/// honoured in development) into an immutable [`Config`] that handlers read
/// through the application state.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:3004)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: *)
/// - `REQUEST_TIMEOUT_SECS`: per-request deadline (default: 30)
/// - `RATE_LIMIT_PER_MINUTE`: per-client request budget (default: 100)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 25)
/// - `JWT_SECRET`: token signing secret, at least 32 characters (required)
/// - `JWT_TTL_SECS`: token lifetime (default: 3600)
/// - `ENCRYPTION_KEY`: security code cipher key (required)
/// - `CACHE_TTL_SECS`: cache entry lifetime (default: 3600)
/// - `REDIS_URL`: Redis connection string; unset uses an in-process cache
/// - `UPLOAD_DIR`: where uploaded files are written (default: uploads)
/// - `UPLOAD_MAX_BYTES`: upload size limit (default: 5 MiB)
/// - `SEED_ADMIN_PASSWORD`: when set, the `admin` account is created on start
/// - `LOG_FORMAT`: `json` for structured logs (default: pretty)
///
/// # Example
///
/// ```no_run
/// use taskvault_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Shortest accepted `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,

    /// Secret for the task security code cipher
    pub encryption_key: String,

    /// Password for the seeded `admin` account
    pub seed_admin_password: Option<String>,

    pub log_format: LogFormat,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,

    pub request_timeout: Duration,

    /// Requests allowed per client IP per minute
    pub rate_limit_per_minute: u32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC signing secret
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub ttl: Duration,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// None selects the in-process store
    pub redis_url: Option<String>,

    pub ttl: Duration,
}

/// Upload configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| {
            var(name).with_context(|| format!("{} environment variable is required", name))
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.chars().count() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let cors_origins = match var("CORS_ORIGINS") {
            Some(origins) if origins.trim() != "*" => origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&var, "API_PORT", 3004)?,
                cors_origins,
                request_timeout: Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", 30)?),
                rate_limit_per_minute: parse_or(&var, "RATE_LIMIT_PER_MINUTE", 100)?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 25)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl: Duration::from_secs(parse_or(&var, "JWT_TTL_SECS", 3600)?),
            },
            cache: CacheConfig {
                redis_url: var("REDIS_URL"),
                ttl: Duration::from_secs(parse_or(&var, "CACHE_TTL_SECS", 3600)?),
            },
            upload: UploadConfig {
                dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
                max_bytes: parse_or(&var, "UPLOAD_MAX_BYTES", 5 * 1024 * 1024)?,
            },
            encryption_key: required("ENCRYPTION_KEY")?,
            seed_admin_password: var("SEED_ADMIN_PASSWORD"),
            log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        None => Ok(default),
    }
}
