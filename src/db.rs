use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PromotionConfig;
use crate::error::PResult;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Creates and configures a PostgreSQL connection pool
///
/// # Arguments
/// * `config` - Loaded configuration; supplies the URL, pool size and acquire timeout
///
/// # Example
/// ```ignore
/// let pool = create_pool(&PromotionConfig::from_env()?).await?;
/// ```
pub async fn create_pool(config: &PromotionConfig) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &DbPool) -> PResult<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations completed successfully");
    Ok(())
}
