//! Shared API types: error body and extractors

pub mod error;
pub mod json;
pub mod object_id;

pub use error::{ApiError, ApiErrorResponse, ErrorMessage};
pub use json::Json;
pub use object_id::ObjectIdPath;
