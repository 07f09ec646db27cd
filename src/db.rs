use crate::config::Config;
use crate::storage::{InMemoryStore, PgStore, Store};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Opens the store selected by the configuration: Postgres when a database
/// URL is set, otherwise the snapshot file.
pub async fn open_store(config: &Config) -> anyhow::Result<Store> {
    if let Some(url) = &config.database_url {
        let db = Database::new(url).await?;
        tracing::info!("Database connection pool established");
        return Ok(Store::Postgres(PgStore::new(db.pool)));
    }

    match &config.snapshot_path {
        Some(path) => {
            let store = InMemoryStore::load(path)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            Ok(Store::Memory(store))
        }
        None => anyhow::bail!("No procurement store configured"),
    }
}
