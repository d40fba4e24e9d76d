use ecto_domain::config::{Config, DatabaseBackend};
use ecto_domain::Result;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;

/// Opens the pool for whichever backend [`Config::database_type`] selects
/// and applies the matching migration set. Postgres uses `database_url`
/// verbatim; SQLite is always a file at `database_path`, created if absent.
pub async fn connect(config: &Config) -> Result<AnyPool> {
    install_default_drivers();

    let url = match config.database_type {
        DatabaseBackend::Postgres => config
            .database_url
            .clone()
            .ok_or_else(|| ecto_domain::EctoError::database("DATABASE_URL is required for the postgres backend"))?,
        DatabaseBackend::Sqlite => format!("sqlite://{}?mode=rwc", config.database_path),
    };

    let pool = AnyPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .map_err(ecto_domain::EctoError::database)?;

    run_migrations(&pool, config.database_type).await?;
    Ok(pool)
}

async fn run_migrations(pool: &AnyPool, backend: DatabaseBackend) -> Result<()> {
    let migrator = match backend {
        DatabaseBackend::Postgres => sqlx::migrate!("migrations/postgres"),
        DatabaseBackend::Sqlite => sqlx::migrate!("migrations/sqlite"),
    };
    migrator.run(pool).await.map_err(ecto_domain::EctoError::database)?;
    tracing::info!(backend = ?backend, "ran database migrations");
    Ok(())
}
