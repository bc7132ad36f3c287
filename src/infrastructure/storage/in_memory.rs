//! In-memory document store implementation

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domain::storage::{
    document_id, prepare_changes, stamp_new, CollectionOptions, Document, DocumentStore, Filter,
    FindQuery, InsertFailure, InsertManyResult, ObjectId,
};
use crate::domain::DomainError;

/// Thread-safe in-memory document store
///
/// Documents are kept in insertion order. Useful for testing and development.
/// Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    options: CollectionOptions,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty store
    pub fn new(options: CollectionOptions) -> Self {
        Self {
            options,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Creates a store pre-populated with documents, stored exactly as given
    pub fn with_documents(options: CollectionOptions, documents: Vec<Document>) -> Self {
        Self {
            options,
            documents: RwLock::new(documents),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Document>>, DomainError> {
        self.documents
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Document>>, DomainError> {
        self.documents
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Reject a document whose unique fields collide with another stored one
    fn check_unique(
        &self,
        documents: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), DomainError> {
        for field in &self.options.unique_fields {
            let value = match candidate.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let taken = documents
                .iter()
                .enumerate()
                .any(|(i, d)| Some(i) != skip && d.get(field) == Some(value));

            if taken {
                return Err(DomainError::conflict(format!(
                    "Duplicate value for unique field '{}' in collection '{}'",
                    field, self.options.name
                )));
            }
        }

        Ok(())
    }

    fn insert_locked(
        &self,
        documents: &mut Vec<Document>,
        mut document: Document,
    ) -> Result<Document, DomainError> {
        stamp_new(&mut document, ObjectId::new(), Utc::now());
        self.check_unique(documents, &document, None)?;

        documents.push(document.clone());
        Ok(document)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, DomainError> {
        let documents = self.read()?;
        Ok(query.apply(documents.iter()))
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DomainError> {
        let documents = self.read()?;
        Ok(documents.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Document>, DomainError> {
        let documents = self.read()?;
        Ok(documents
            .iter()
            .find(|d| document_id(d).as_ref() == Some(id))
            .cloned())
    }

    async fn insert_one(&self, document: Document) -> Result<Document, DomainError> {
        let mut documents = self.write()?;
        self.insert_locked(&mut documents, document)
    }

    async fn insert_many(&self, batch: Vec<Document>) -> Result<InsertManyResult, DomainError> {
        let mut documents = self.write()?;
        let mut result = InsertManyResult::default();

        for (index, document) in batch.into_iter().enumerate() {
            match self.insert_locked(&mut documents, document) {
                Ok(stored) => result.inserted.push(stored),
                Err(e) => result.failures.push(InsertFailure {
                    index,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(result)
    }

    async fn update_by_id(
        &self,
        id: &ObjectId,
        changes: Document,
    ) -> Result<Option<Document>, DomainError> {
        let mut documents = self.write()?;

        let Some(position) = documents
            .iter()
            .position(|d| document_id(d).as_ref() == Some(id))
        else {
            return Ok(None);
        };

        let mut updated = documents[position].clone();
        updated.extend(prepare_changes(changes, Utc::now()));
        self.check_unique(&documents, &updated, Some(position))?;

        documents[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.read().map(|_| ())
    }
}
