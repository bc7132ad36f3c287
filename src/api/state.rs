//! Application state for shared services

use std::path::Path;
use std::sync::Arc;

use crate::config::UploadConfig;
use crate::domain::storage::{Document, DocumentStore, ObjectId};
use crate::domain::{DomainError, NewUser, User, UserPatch};
use crate::infrastructure::user::{BulkInsertSummary, ListUsersParams, UserService};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    /// Raw store handle, used by the readiness probe
    pub store: Arc<dyn DocumentStore>,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(
        user_service: Arc<dyn UserServiceTrait>,
        store: Arc<dyn DocumentStore>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            user_service,
            store,
            upload,
        }
    }
}

/// Trait for user service operations
#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User, DomainError>;
    async fn get_users(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError>;
    async fn update_user(&self, id: &ObjectId, patch: UserPatch) -> Result<User, DomainError>;
    async fn delete_user(&self, id: &ObjectId) -> Result<User, DomainError>;
    async fn bulk_insert_users(
        &self,
        records: Vec<Document>,
    ) -> Result<BulkInsertSummary, DomainError>;
    async fn import_file(&self, path: &Path) -> Result<BulkInsertSummary, DomainError>;
}

#[async_trait::async_trait]
impl UserServiceTrait for UserService {
    async fn create_user(&self, new_user: NewUser) -> Result<User, DomainError> {
        UserService::create_user(self, new_user).await
    }

    async fn get_users(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError> {
        UserService::get_users(self, params).await
    }

    async fn update_user(&self, id: &ObjectId, patch: UserPatch) -> Result<User, DomainError> {
        UserService::update_user(self, id, patch).await
    }

    async fn delete_user(&self, id: &ObjectId) -> Result<User, DomainError> {
        UserService::delete_user(self, id).await
    }

    async fn bulk_insert_users(
        &self,
        records: Vec<Document>,
    ) -> Result<BulkInsertSummary, DomainError> {
        UserService::bulk_insert_users(self, records).await
    }

    async fn import_file(&self, path: &Path) -> Result<BulkInsertSummary, DomainError> {
        UserService::import_file(self, path).await
    }
}
