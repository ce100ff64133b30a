use thiserror::Error;
use tracing::info;

use wedmatch_core::config::{AppConfig, ConfigError, LoadOptions};
use wedmatch_core::RecommendationServices;
use wedmatch_db::{connect_with_config, migrations, sql_stores, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: RecommendationServices,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        cache_backend = config.cache.backend.as_str(),
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let stores = sql_stores(&db_pool, config.cache.backend);
    let services = RecommendationServices::new(stores, config.recommendations.engine_settings());

    Ok(Application { config, db_pool, services })
}
