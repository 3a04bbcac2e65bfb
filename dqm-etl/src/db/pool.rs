//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits.

use dqm_core::DatabaseTarget;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Default maximum connections for the pool.
/// Ingestion runs on one connection; the rest serve browsing queries.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection fails.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&DatabaseTarget::Url("postgres://localhost/dqm".into())).await?;
/// ```
pub async fn create_pool(target: &DatabaseTarget) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(target, DEFAULT_MAX_CONNECTIONS).await
}

/// Create a PostgreSQL connection pool with custom options.
pub async fn create_pool_with_options(
    target: &DatabaseTarget,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(connect_options(target)?)
        .await
}

/// Build connect options from a URL or from split settings.
pub fn connect_options(target: &DatabaseTarget) -> Result<PgConnectOptions, sqlx::Error> {
    match target {
        DatabaseTarget::Url(url) => url.parse(),
        DatabaseTarget::Parts {
            host,
            port,
            name,
            user,
            password,
        } => {
            let mut options = PgConnectOptions::new().host(host).database(name);
            if let Some(port) = port {
                options = options.port(*port);
            }
            if let Some(user) = user {
                options = options.username(user);
            }
            if let Some(password) = password {
                options = options.password(password);
            }
            Ok(options)
        }
    }
}
