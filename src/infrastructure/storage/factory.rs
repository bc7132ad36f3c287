//! Storage factory for runtime backend selection

use std::sync::Arc;

use crate::domain::storage::{CollectionOptions, DocumentStore};
use crate::domain::DomainError;

use super::in_memory::InMemoryDocumentStore;
use super::postgres::{PostgresConfig, PostgresDocumentStore};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Factory for creating document stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a document store for a collection based on the configuration
    pub async fn create(
        config: &StorageConfig,
        options: CollectionOptions,
    ) -> Result<Arc<dyn DocumentStore>, DomainError> {
        match config {
            StorageConfig::InMemory => Ok(Self::create_in_memory(options)),
            StorageConfig::Postgres(pg_config) => {
                let store = Self::create_postgres(pg_config, options).await?;
                Ok(store)
            }
        }
    }

    pub fn create_in_memory(options: CollectionOptions) -> Arc<InMemoryDocumentStore> {
        Arc::new(InMemoryDocumentStore::new(options))
    }

    /// Connects and makes sure the collection table exists
    pub async fn create_postgres(
        config: &PostgresConfig,
        options: CollectionOptions,
    ) -> Result<Arc<PostgresDocumentStore>, DomainError> {
        let store = PostgresDocumentStore::connect(config, options).await?;
        store.ensure_table().await?;
        Ok(Arc::new(store))
    }
}
