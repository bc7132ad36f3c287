//! User service: creation, listing, updates, soft deletes and bulk import

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::ingestion::RecordParser;
use crate::domain::storage::{Document, DocumentStore, Filter, FindQuery, ObjectId, SortDirection};
use crate::domain::user::schema::EMAIL_FIELD;
use crate::domain::user::{cast_new_document, not_deleted, NewUser, User, UserPatch};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_users_imported;

/// Listing parameters. `page` is 1-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListUsersParams {
    pub limit: u64,
    pub page: u64,
    pub sort: SortDirection,
    pub sort_by: String,
    /// Extra constraints ANDed with the soft-delete filter
    pub filters: Vec<Filter>,
}

impl ListUsersParams {
    fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Counts reported after a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertSummary {
    pub success_count: u64,
    pub failed_count: u64,
}

/// User service over a document store
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    parser: Arc<dyn RecordParser>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, parser: Arc<dyn RecordParser>) -> Self {
        Self { store, parser }
    }

    /// Create a user. Fails with `Conflict` when the email is already taken.
    ///
    /// The email check and the insert are separate round-trips; the store's
    /// unique constraint rejects the loser of a concurrent race.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, DomainError> {
        let existing = self
            .store
            .find_one(&Filter::eq(EMAIL_FIELD, new_user.email.clone()))
            .await?;

        if existing.is_some() {
            return Err(DomainError::conflict("Email must be unique"));
        }

        let stored = self.store.insert_one(new_user.into_document()).await?;
        let user = User::from_document(stored)?;

        tracing::info!(user_id = %user.id(), "User created");
        Ok(user)
    }

    /// One page of users that are not soft-deleted
    pub async fn get_users(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError> {
        let skip = params.skip();

        let mut conditions = Vec::with_capacity(params.filters.len() + 1);
        conditions.push(not_deleted());
        conditions.extend(params.filters);

        let query = FindQuery::new(Filter::and(conditions))
            .with_sort(params.sort_by, params.sort)
            .with_skip(skip)
            .with_limit(params.limit);

        self.store
            .find(&query)
            .await?
            .into_iter()
            .map(User::from_document)
            .collect()
    }

    /// Overwrite the fields present in `patch` and return the updated user
    pub async fn update_user(&self, id: &ObjectId, patch: UserPatch) -> Result<User, DomainError> {
        let updated = self
            .store
            .update_by_id(id, patch.into_document())
            .await?
            .ok_or_else(|| DomainError::not_found("User not found"))?;

        User::from_document(updated)
    }

    /// Mark a user as deleted. The record stays in storage.
    pub async fn delete_user(&self, id: &ObjectId) -> Result<User, DomainError> {
        let user = self.update_user(id, UserPatch::soft_delete()).await?;

        tracing::info!(user_id = %id, "User soft-deleted");
        Ok(user)
    }

    /// Unordered bulk insert of raw records.
    ///
    /// Records that fail the schema cast or are rejected by the store are
    /// counted as failed. If the store cannot finish the insert the whole
    /// import fails with `IngestionFailed`; records the store wrote before
    /// failing are not rolled back.
    pub async fn bulk_insert_users(
        &self,
        records: Vec<Document>,
    ) -> Result<BulkInsertSummary, DomainError> {
        let total = records.len() as u64;

        let mut documents = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match cast_new_document(record) {
                Ok(document) => documents.push(document),
                Err(e) => tracing::debug!(index, error = %e, "Rejected import record"),
            }
        }

        let success_count = if documents.is_empty() {
            0
        } else {
            let result = self.store.insert_many(documents).await.map_err(|e| {
                tracing::error!(error = %e, "Bulk insert failed");
                DomainError::ingestion_failed(format!("Bulk insert failed: {}", e))
            })?;

            for failure in &result.failures {
                tracing::debug!(
                    index = failure.index,
                    reason = %failure.reason,
                    "Store rejected import record"
                );
            }

            result.inserted_count() as u64
        };

        let summary = BulkInsertSummary {
            success_count,
            failed_count: total - success_count,
        };

        record_users_imported(summary.success_count, summary.failed_count);
        tracing::info!(
            success_count = summary.success_count,
            failed_count = summary.failed_count,
            "Bulk user import finished"
        );

        Ok(summary)
    }

    /// Parse a CSV file on disk and bulk insert its records
    pub async fn import_file(&self, path: &Path) -> Result<BulkInsertSummary, DomainError> {
        let records = self.parser.parse_file(path).await?;
        self.bulk_insert_users(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ingestion::{HeaderMapping, MockRecordParser};
    use crate::domain::storage::{document_id, MockDocumentStore, IMMUTABLE_FIELDS};
    use crate::domain::user::{collection_options, USERS_COLLECTION};
    use crate::infrastructure::ingestion::CsvRecordParser;
    use crate::infrastructure::storage::InMemoryDocumentStore;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn store() -> Arc<InMemoryDocumentStore> {
        Arc::new(InMemoryDocumentStore::new(collection_options(USERS_COLLECTION)))
    }

    fn service_with(store: Arc<InMemoryDocumentStore>) -> UserService {
        UserService::new(store, Arc::new(CsvRecordParser::new(HeaderMapping::users())))
    }

    fn new_user(first_name: &str, email: &str, phone: &str) -> NewUser {
        NewUser {
            first_name: first_name.to_string(),
            last_name: "Alanis".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            marketing_source: None,
            birth_date: Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            status: None,
        }
    }

    fn record(email: &str, phone: &str) -> Document {
        json!({
            "firstName": "Daniel",
            "lastName": "Alanis",
            "email": email,
            "phone": phone,
            "birthDate": "1990-01-01"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn params(limit: u64, page: u64) -> ListUsersParams {
        ListUsersParams {
            limit,
            page,
            sort: SortDirection::Asc,
            sort_by: "firstName".to_string(),
            filters: Vec::new(),
        }
    }

    async fn all_documents(store: &InMemoryDocumentStore) -> Vec<Document> {
        store.find(&FindQuery::new(Filter::all())).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_user() {
        let service = service_with(store());

        let user = service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        assert_eq!(user.email(), "d@x.com");
        assert!(!user.is_deleted());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[tokio::test]
    async fn test_create_duplicate_email_conflicts_without_insert() {
        let store = store();
        let service = service_with(store.clone());
        service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        let result = service
            .create_user(new_user("Other", "d@x.com", "(555) 555-0000"))
            .await;

        match result {
            Err(DomainError::Conflict { message }) => assert_eq!(message, "Email must be unique"),
            other => panic!("Expected conflict, got {:?}", other),
        }
        assert_eq!(all_documents(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_email_match_is_case_sensitive() {
        let service = service_with(store());
        service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        let result = service
            .create_user(new_user("Daniel", "D@x.com", "(555) 555-0000"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_conflicts_with_soft_deleted_email() {
        let service = service_with(store());
        let user = service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();
        service.delete_user(user.id()).await.unwrap();

        let result = service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-0000"))
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_store_unique_phone_surfaces_as_conflict() {
        let service = service_with(store());
        service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        let result = service
            .create_user(new_user("Ana", "a@x.com", "(555) 555-5555"))
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_soft_deleted_user_hidden_but_stored() {
        let store = store();
        let service = service_with(store.clone());
        let user = service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        let deleted = service.delete_user(user.id()).await.unwrap();
        assert!(deleted.is_deleted());

        let listed = service.get_users(params(10, 1)).await.unwrap();
        assert!(listed.is_empty());

        let raw = store.get(user.id()).await.unwrap().unwrap();
        assert_eq!(raw["isDeleted"], json!(true));
    }

    #[tokio::test]
    async fn test_legacy_record_without_flag_is_listed() {
        let legacy = json!({
            "_id": "65a1b2c3d4e5f60718293a4b",
            "firstName": "Legacy",
            "lastName": "User",
            "email": "legacy@x.com",
            "phone": "(555) 555-1111",
            "birthDate": "1980-01-01T00:00:00.000Z",
            "createdAt": "2020-01-01T00:00:00.000Z",
            "updatedAt": "2020-01-01T00:00:00.000Z"
        })
        .as_object()
        .cloned()
        .unwrap();
        let store = Arc::new(InMemoryDocumentStore::with_documents(
            collection_options(USERS_COLLECTION),
            vec![legacy],
        ));
        let service = service_with(store);

        let listed = service.get_users(params(10, 1)).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email(), "legacy@x.com");
        assert!(!listed[0].is_deleted());
    }

    #[tokio::test]
    async fn test_pagination_returns_third_and_fourth() {
        let service = service_with(store());
        for (i, name) in ["Eve", "Cid", "Ada", "Dan", "Bob"].iter().enumerate() {
            service
                .create_user(new_user(
                    name,
                    &format!("{}@x.com", name),
                    &format!("(555) 555-000{}", i),
                ))
                .await
                .unwrap();
        }

        let page = service.get_users(params(2, 2)).await.unwrap();

        let names: Vec<&str> = page.iter().map(|u| u.first_name()).collect();
        assert_eq!(names, vec!["Cid", "Dan"]);
    }

    #[tokio::test]
    async fn test_get_users_applies_extra_filters() {
        let service = service_with(store());
        let mut lead = new_user("Daniel", "d@x.com", "(555) 555-5555");
        lead.status = Some("Lead".to_string());
        service.create_user(lead).await.unwrap();
        service
            .create_user(new_user("Ana", "a@x.com", "(555) 555-0000"))
            .await
            .unwrap();

        let mut query = params(10, 1);
        query.filters.push(Filter::eq("status", "Lead"));
        let listed = service.get_users(query).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].first_name(), "Daniel");
    }

    #[tokio::test]
    async fn test_update_user_overwrites_present_fields() {
        let service = service_with(store());
        let user = service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();

        let patch = UserPatch {
            status: Some("Converted".to_string()),
            first_name: Some("Dan".to_string()),
            ..Default::default()
        };
        let updated = service.update_user(user.id(), patch).await.unwrap();

        assert_eq!(updated.first_name(), "Dan");
        assert_eq!(updated.status(), Some("Converted"));
        assert_eq!(updated.email(), "d@x.com");
        assert_eq!(updated.id(), user.id());
        assert_eq!(updated.created_at(), user.created_at());
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_id_not_found() {
        let store = store();
        let service = service_with(store.clone());
        service
            .create_user(new_user("Daniel", "d@x.com", "(555) 555-5555"))
            .await
            .unwrap();
        let before = all_documents(&store).await;

        let missing = ObjectId::new();
        let update = service
            .update_user(
                &missing,
                UserPatch {
                    status: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await;
        let delete = service.delete_user(&missing).await;

        match update {
            Err(DomainError::NotFound { message }) => assert_eq!(message, "User not found"),
            other => panic!("Expected not found, got {:?}", other),
        }
        assert!(matches!(delete, Err(DomainError::NotFound { .. })));
        assert_eq!(all_documents(&store).await, before);
    }

    #[tokio::test]
    async fn test_bulk_insert_counts_duplicates() {
        let store = store();
        let service = service_with(store.clone());

        let records = vec![
            record("a@x.com", "(555) 555-0001"),
            record("b@x.com", "(555) 555-0002"),
            record("a@x.com", "(555) 555-0003"),
            record("c@x.com", "(555) 555-0004"),
            record("d@x.com", "(555) 555-0002"),
        ];
        let summary = service.bulk_insert_users(records).await.unwrap();

        assert_eq!(
            summary,
            BulkInsertSummary {
                success_count: 3,
                failed_count: 2
            }
        );

        let stored: Vec<Value> = all_documents(&store)
            .await
            .iter()
            .map(|d| d["email"].clone())
            .collect();
        assert_eq!(stored, vec![json!("a@x.com"), json!("b@x.com"), json!("c@x.com")]);
    }

    #[tokio::test]
    async fn test_bulk_insert_counts_uncastable_records() {
        let service = service_with(store());

        let mut missing_name = record("b@x.com", "(555) 555-0002");
        missing_name.remove("firstName");
        let mut bad_date = record("c@x.com", "(555) 555-0003");
        bad_date.insert("birthDate".to_string(), json!("not a date"));

        let summary = service
            .bulk_insert_users(vec![record("a@x.com", "(555) 555-0001"), missing_name, bad_date])
            .await
            .unwrap();

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failed_count, 2);
    }

    #[tokio::test]
    async fn test_bulk_insert_empty() {
        let service = service_with(store());
        let summary = service.bulk_insert_users(Vec::new()).await.unwrap();
        assert_eq!(summary, BulkInsertSummary::default());
    }

    #[tokio::test]
    async fn test_bulk_insert_total_failure_is_ingestion_failed() {
        let mut mock = MockDocumentStore::new();
        mock.expect_insert_many()
            .times(1)
            .returning(|_| Err(DomainError::storage("connection refused")));

        let service = UserService::new(Arc::new(mock), Arc::new(CsvRecordParser::default()));
        let result = service
            .bulk_insert_users(vec![record("a@x.com", "(555) 555-0001")])
            .await;

        assert!(matches!(result, Err(DomainError::IngestionFailed { .. })));
    }

    #[tokio::test]
    async fn test_bulk_insert_aborted_midway_keeps_store_detail() {
        let mut mock = MockDocumentStore::new();
        mock.expect_insert_many().times(1).returning(|_| {
            Err(DomainError::storage(
                "Bulk insert aborted after 1 documents: pool timed out",
            ))
        });

        let service = UserService::new(Arc::new(mock), Arc::new(CsvRecordParser::default()));
        let result = service
            .bulk_insert_users(vec![
                record("a@x.com", "(555) 555-0001"),
                record("b@x.com", "(555) 555-0002"),
            ])
            .await;

        match result {
            Err(DomainError::IngestionFailed { message }) => {
                assert!(message.contains("aborted after 1 documents"), "{}", message);
            }
            other => panic!("expected IngestionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_strips_store_managed_fields() {
        let store = store();
        let service = service_with(store.clone());

        let mut spoofed = record("a@x.com", "(555) 555-0001");
        spoofed.insert("_id".to_string(), json!("000000000000000000000000"));
        spoofed.insert("isDeleted".to_string(), json!(true));
        service.bulk_insert_users(vec![spoofed]).await.unwrap();

        let stored = &all_documents(&store).await[0];
        assert_ne!(document_id(stored).unwrap().to_hex(), "000000000000000000000000");
        assert_eq!(stored["isDeleted"], json!(false));
        for field in IMMUTABLE_FIELDS {
            assert!(stored.contains_key(*field));
        }
    }

    #[tokio::test]
    async fn test_import_file_uses_parser() {
        let mut parser = MockRecordParser::new();
        parser
            .expect_parse_file()
            .times(1)
            .returning(|_| Ok(vec![record("a@x.com", "(555) 555-0001")]));

        let service = UserService::new(store(), Arc::new(parser));
        let summary = service.import_file(Path::new("users.csv")).await.unwrap();

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failed_count, 0);
    }

    #[tokio::test]
    async fn test_import_csv_maps_provider_and_drops_notes() {
        let store = store();
        let service = service_with(store.clone());

        let path = std::env::temp_dir().join(format!("import-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "firstname,lastname,email,phone,status,provider,birth_date,notes\n\
             Daniel,Alanis,d@x.com,(555) 555-5555,Lead,Facebook,1990-01-01,vip\n",
        )
        .unwrap();

        let summary = service.import_file(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(summary.success_count, 1);
        let stored = &all_documents(&store).await[0];
        assert_eq!(stored["marketingSource"], json!("Facebook"));
        assert!(!stored.contains_key("notes"));
        assert!(!stored.contains_key("provider"));
    }
}
