//! Document store trait definition

use async_trait::async_trait;

use crate::domain::DomainError;

use super::document::Document;
use bson::oid::ObjectId;
use super::query::{Filter, FindQuery};

#[cfg(test)]
use mockall::automock;

/// A single record rejected by an unordered bulk insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertFailure {
    /// Position of the record in the submitted batch
    pub index: usize,
    /// Why the store rejected it
    pub reason: String,
}

/// Outcome of an unordered bulk insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    /// Documents that were persisted, as stored
    pub inserted: Vec<Document>,
    /// Records the store rejected; siblings were still attempted
    pub failures: Vec<InsertFailure>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Collection-level settings shared by every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Collection (table) name
    pub name: String,
    /// Fields with a hard uniqueness constraint
    pub unique_fields: Vec<String>,
}

impl CollectionOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_fields: Vec::new(),
        }
    }

    pub fn with_unique_field(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }
}

/// A collection of schemaless documents.
///
/// The store owns `_id`, `createdAt` and `updatedAt`. Every operation is a
/// single round-trip with no retry; errors propagate unchanged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Filtered, sorted and paginated find
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, DomainError>;

    /// First document matching the filter, in insertion order
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DomainError>;

    /// Raw lookup by identifier, regardless of any soft-delete flag
    async fn get(&self, id: &ObjectId) -> Result<Option<Document>, DomainError>;

    /// Insert one document, returning it with identity and timestamps.
    /// Unique-field violations are reported as `Conflict`.
    async fn insert_one(&self, document: Document) -> Result<Document, DomainError>;

    /// Unordered bulk insert: rejected records are collected, the rest persist.
    ///
    /// An `Err` means the operation could not run to completion. It does not
    /// mean nothing was written: backends that insert one document at a time
    /// keep whatever was inserted before the failure.
    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyResult, DomainError>;

    /// Merge `changes` into the document and return the post-update version,
    /// or `None` when no document has this identifier
    async fn update_by_id(
        &self,
        id: &ObjectId,
        changes: Document,
    ) -> Result<Option<Document>, DomainError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), DomainError>;
}
