//! Users API
//!
//! A REST service over user records with:
//! - Create, list (filtered, sorted, paginated) and partial update
//! - Soft delete that keeps records in storage
//! - Bulk CSV import, unordered and tolerant of per-record failures
//! - In-memory or PostgreSQL (JSONB) document storage

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::ingestion::HeaderMapping;
use domain::storage::DocumentStore;
use domain::user::collection_options;
use infrastructure::ingestion::CsvRecordParser;
use infrastructure::storage::{PostgresConfig, StorageConfig, StorageFactory, StorageType};
use infrastructure::user::UserService;
use tracing::info;

/// Create the application state with default configuration (in-memory storage)
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = create_user_store(config).await?;
    let parser = Arc::new(CsvRecordParser::new(HeaderMapping::users()));
    let user_service = Arc::new(UserService::new(store.clone(), parser));

    Ok(AppState::new(user_service, store, config.upload.clone()))
}

/// Build the user service alone, for commands that do not serve HTTP
pub async fn create_user_service(config: &AppConfig) -> anyhow::Result<UserService> {
    let store = create_user_store(config).await?;
    let parser = Arc::new(CsvRecordParser::new(HeaderMapping::users()));

    Ok(UserService::new(store, parser))
}

async fn create_user_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let storage_config = storage_config(config)?;
    info!(
        "Storage backend: {:?}, collection: {}",
        storage_config.storage_type(),
        config.storage.collection
    );

    let store = StorageFactory::create(
        &storage_config,
        collection_options(config.storage.collection.clone()),
    )
    .await?;

    Ok(store)
}

fn storage_config(config: &AppConfig) -> anyhow::Result<StorageConfig> {
    let backend = StorageType::from_str(&config.storage.backend).ok_or_else(|| {
        anyhow::anyhow!("Unknown storage backend '{}'", config.storage.backend)
    })?;

    match backend {
        StorageType::InMemory => Ok(StorageConfig::in_memory()),
        StorageType::Postgres => {
            let url = match &config.storage.database_url {
                Some(url) => url.clone(),
                None => std::env::var("DATABASE_URL").map_err(|_| {
                    anyhow::anyhow!(
                        "storage.database_url or DATABASE_URL is required for the postgres backend"
                    )
                })?,
            };

            Ok(StorageConfig::postgres(
                PostgresConfig::new(url).with_max_connections(config.storage.max_connections),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_state_uses_memory_store() {
        let state = create_app_state().await.unwrap();
        assert!(state.store.ping().await.is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.backend = "mongodb".to_string();

        assert!(storage_config(&config).is_err());
    }

    #[test]
    fn test_postgres_backend_uses_configured_url() {
        let mut config = AppConfig::default();
        config.storage.backend = "postgres".to_string();
        config.storage.database_url = Some("postgres://localhost/users".to_string());
        config.storage.max_connections = 4;

        match storage_config(&config).unwrap() {
            StorageConfig::Postgres(pg) => {
                assert_eq!(pg.url, "postgres://localhost/users");
                assert_eq!(pg.max_connections, 4);
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }
}
