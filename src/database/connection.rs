use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;

pub async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")?;
    Ok(pool)
}

/// A pool that opens its first connection on first use.
pub fn connect_lazy(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_lazy(&config.database_url)
        .context("parse DATABASE_URL")?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("apply migrations")?;
    log::info!("> Migrations applied");
    Ok(())
}

pub async fn check_health(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            log::warn!("> Health check failed: {e}");
            false
        }
    }
}
