use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

/// Pool tuning read from the `DB_*` settings.
#[derive(Debug, Clone, Copy)]
pub struct PoolTuning {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl PoolTuning {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            connect_timeout: Duration::from_secs(config.db_connect_timeout_seconds),
            idle_timeout: Duration::from_secs(config.db_idle_timeout_seconds),
            max_lifetime: Duration::from_secs(config.db_max_lifetime_seconds),
        }
    }
}

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let tuning = PoolTuning::from_config(config);
        let pool = PgPoolOptions::new()
            .max_connections(tuning.max_connections)
            .acquire_timeout(tuning.connect_timeout)
            .idle_timeout(tuning.idle_timeout)
            .max_lifetime(tuning.max_lifetime)
            .connect(&config.database_url)
            .await?;
        tracing::debug!(
            max_connections = tuning.max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
