//! Record parser trait

use std::path::Path;

use async_trait::async_trait;

use crate::domain::storage::Document;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Turns an uploaded file into field-mapped records, in file order.
///
/// Parsers do not validate field contents; bad rows surface when the
/// records are inserted.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordParser: Send + Sync {
    /// Parse a file on disk
    async fn parse_file(&self, path: &Path) -> Result<Vec<Document>, DomainError>;
}
