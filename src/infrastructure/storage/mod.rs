//! Storage infrastructure - document store implementations

mod factory;
mod in_memory;
mod postgres;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryDocumentStore;
pub use postgres::{PostgresConfig, PostgresDocumentStore};
