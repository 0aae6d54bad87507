//! # Database Connection
//!
//! The database is optional. With `DATABASE_URL` set, records and creators
//! live in PostgreSQL; without it the service runs on the in-memory store and
//! nothing survives a restart.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect and apply migrations.
///
/// `Ok(None)` when `DATABASE_URL` is not set. `Err` when it is set but the
/// connection or a migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running on the in-memory store. \
                 Records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = connect(&url).await?;
    tracing::info!("connected to PostgreSQL");

    snapie_store::MIGRATOR.run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// Pool with the service's sizing.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
}

/// Round-trip a trivial query, for the readiness probe.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
