//! # TaskVault API Server
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/taskvault \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! ENCRYPTION_KEY=change-me \
//! cargo run -p taskvault-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use taskvault_api::app::{build_router, AppState};
use taskvault_api::config::{Config, LogFormat};
use taskvault_shared::auth::password::hash_password;
use taskvault_shared::cache::{CacheStore, EntityCache, MemoryCache};
use taskvault_shared::db::migrations::{run_migrations, seed_admin};
use taskvault_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use taskvault_shared::redis::client::{RedisClient, RedisConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        "TaskVault API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;

    if let Some(password) = &config.seed_admin_password {
        seed_admin(&pool, &hash_password(password)?).await?;
    }

    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => Arc::new(RedisClient::new(RedisConfig::new(url.clone())).await?),
        None => {
            tracing::warn!("REDIS_URL not set, using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };
    let cache = EntityCache::new(store, config.cache.ttl);

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), cache, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "taskvault_api=debug,taskvault_shared=debug,tower_http=info".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
