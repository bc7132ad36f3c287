//! Domain layer - Core business logic and entities

pub mod error;
pub mod ingestion;
pub mod storage;
pub mod user;

pub use error::DomainError;
pub use ingestion::{HeaderMapping, RecordParser};
pub use storage::{Document, DocumentStore, Filter, FindQuery, ObjectId, SortDirection};
pub use user::{NewUser, User, UserPatch, UserValidationError};

impl From<UserValidationError> for DomainError {
    fn from(error: UserValidationError) -> Self {
        DomainError::validation(error.to_string())
    }
}
