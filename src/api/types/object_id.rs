//! Path extractor for document identifiers

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use super::error::ApiError;
use crate::domain::storage::ObjectId;

/// The `{id}` path segment, parsed as an [`ObjectId`].
///
/// Malformed identifiers are rejected with 400 before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectIdPath(pub ObjectId);

impl<S> FromRequestParts<S> for ObjectIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        ObjectId::parse_str(&raw)
            .map(ObjectIdPath)
            .map_err(|e| ApiError::bad_request(format!("Invalid id '{}': {}", raw, e)))
    }
}
