//! PostgreSQL document store with connection pooling

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::domain::storage::{
    prepare_changes, stamp_new, CollectionOptions, Document, DocumentStore, Filter,
    FilterCondition, FilterOperator, FindQuery, InsertFailure, InsertManyResult, ObjectId,
    SortDirection, ID_FIELD,
};
use crate::domain::DomainError;

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/users_api".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// A value bound to a `$n` placeholder
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Json(Value),
    Int(i64),
}

/// SQL fragment plus the parameters it binds, in placeholder order
#[derive(Debug, Default)]
struct SqlBuilder {
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    fn push(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn field(&mut self, field: &str) -> String {
        let placeholder = self.push(SqlParam::Text(field.to_string()));
        format!("(data -> {})", placeholder)
    }

    fn filter(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::Condition(condition) => self.condition(condition),
            Filter::And(filters) if filters.is_empty() => "TRUE".to_string(),
            Filter::Or(filters) if filters.is_empty() => "FALSE".to_string(),
            Filter::And(filters) => self.join(filters, " AND "),
            Filter::Or(filters) => self.join(filters, " OR "),
        }
    }

    fn join(&mut self, filters: &[Filter], separator: &str) -> String {
        let parts: Vec<String> = filters.iter().map(|f| self.filter(f)).collect();
        format!("({})", parts.join(separator))
    }

    fn condition(&mut self, condition: &FilterCondition) -> String {
        let FilterCondition {
            field,
            operator,
            value,
        } = condition;

        match operator {
            FilterOperator::Exists => {
                let name = self.push(SqlParam::Text(field.clone()));
                format!("(data ? {})", name)
            }
            FilterOperator::NotExists => {
                let name = self.push(SqlParam::Text(field.clone()));
                format!("(NOT (data ? {}))", name)
            }
            FilterOperator::Eq if value.is_null() => {
                let column = self.field(field);
                format!("({column} IS NULL OR {column} = 'null'::jsonb)")
            }
            FilterOperator::Ne if value.is_null() => {
                let column = self.field(field);
                format!("({column} IS NOT NULL AND {column} <> 'null'::jsonb)")
            }
            FilterOperator::Eq => {
                let column = self.field(field);
                let value = self.push(SqlParam::Json(value.clone()));
                format!("({} = {})", column, value)
            }
            FilterOperator::Ne => {
                let column = self.field(field);
                let value = self.push(SqlParam::Json(value.clone()));
                format!("({} IS DISTINCT FROM {})", column, value)
            }
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                let column = self.field(field);
                let value = self.push(SqlParam::Json(value.clone()));
                format!(
                    "(jsonb_typeof({column}) = jsonb_typeof({value}::jsonb) AND {column} {operator} {value})"
                )
            }
        }
    }

    fn bind<'q>(
        &'q self,
        mut query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        for param in &self.params {
            query = match param {
                SqlParam::Text(text) => query.bind(text.clone()),
                SqlParam::Json(value) => query.bind(value.clone()),
                SqlParam::Int(number) => query.bind(*number),
            };
        }
        query
    }
}

/// Table and column names are interpolated, so only plain identifiers are allowed
fn validate_identifier(kind: &str, name: &str) -> Result<(), DomainError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(DomainError::configuration(format!(
            "Invalid {} name '{}': use letters, digits and underscores",
            kind, name
        )));
    }

    Ok(())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Document, DomainError> {
    let data: Value = row
        .try_get("data")
        .map_err(|e| DomainError::storage(format!("Failed to read document: {}", e)))?;

    match data {
        Value::Object(document) => Ok(document),
        other => Err(DomainError::storage(format!(
            "Stored document is not an object: {}",
            other
        ))),
    }
}

/// PostgreSQL document store
///
/// Each collection is a table of `(id, seq, data JSONB)` rows. `seq` keeps
/// insertion order for tie-breaking. Unique fields are enforced by unique
/// expression indexes on `data ->> field`.
pub struct PostgresDocumentStore {
    pool: PgPool,
    options: CollectionOptions,
}

impl Debug for PostgresDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDocumentStore")
            .field("collection", &self.options.name)
            .finish()
    }
}

impl PostgresDocumentStore {
    /// Creates a store over an existing pool
    pub fn new(pool: PgPool, options: CollectionOptions) -> Result<Self, DomainError> {
        validate_identifier("collection", &options.name)?;
        for field in &options.unique_fields {
            validate_identifier("field", field)?;
        }

        Ok(Self { pool, options })
    }

    /// Creates a store with its own connection pool
    pub async fn connect(
        config: &PostgresConfig,
        options: CollectionOptions,
    ) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Self::new(pool, options)
    }

    fn table(&self) -> &str {
        &self.options.name
    }

    /// Ensures the collection table and its unique indexes exist
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(24) PRIMARY KEY,
                seq BIGSERIAL NOT NULL,
                data JSONB NOT NULL
            )
            "#,
            self.table()
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        for field in &self.options.unique_fields {
            let query = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{field}_key ON {table} ((data ->> '{field}'))",
                table = self.table(),
            );

            sqlx::query(&query)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to create index on '{}': {}", field, e))
                })?;
        }

        Ok(())
    }

    fn select_sql(&self, query: &FindQuery, builder: &mut SqlBuilder) -> String {
        let condition = builder.filter(&query.filter);
        let mut sql = format!("SELECT data FROM {} WHERE {}", self.table(), condition);

        match &query.sort {
            Some(sort) => {
                let column = builder.field(&sort.field);
                let direction = match sort.direction {
                    SortDirection::Asc => "ASC NULLS FIRST",
                    SortDirection::Desc => "DESC NULLS LAST",
                };
                sql.push_str(&format!(" ORDER BY {} {}, seq ASC", column, direction));
            }
            None => sql.push_str(" ORDER BY seq ASC"),
        }

        if query.skip > 0 {
            let skip = builder.push(SqlParam::Int(i64::try_from(query.skip).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" OFFSET {}", skip));
        }

        if let Some(limit) = query.limit {
            let limit = builder.push(SqlParam::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    /// Insert a single stamped document
    async fn insert_row(&self, document: &Document) -> Result<(), sqlx::Error> {
        let id = document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let query = format!("INSERT INTO {} (id, data) VALUES ($1, $2)", self.table());

        sqlx::query(&query)
            .bind(id)
            .bind(Value::Object(document.clone()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn write_error(&self, action: &str, error: sqlx::Error) -> DomainError {
        if is_unique_violation(&error) {
            DomainError::conflict(format!(
                "Duplicate value for a unique field in collection '{}'",
                self.table()
            ))
        } else {
            DomainError::storage(format!("Failed to {}: {}", action, error))
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, DomainError> {
        let mut builder = SqlBuilder::default();
        let sql = self.select_sql(query, &mut builder);

        let rows = builder
            .bind(sqlx::query(&sql))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find documents: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DomainError> {
        let query = FindQuery::new(filter.clone()).with_limit(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Document>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE id = $1", self.table());

        let row = sqlx::query(&query)
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get document: {}", e)))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn insert_one(&self, mut document: Document) -> Result<Document, DomainError> {
        stamp_new(&mut document, ObjectId::new(), Utc::now());

        self.insert_row(&document)
            .await
            .map_err(|e| self.write_error("insert document", e))?;

        Ok(document)
    }

    /// Rows are inserted one by one outside a transaction. A non-database
    /// error stops the batch and leaves earlier rows in the table.
    async fn insert_many(&self, batch: Vec<Document>) -> Result<InsertManyResult, DomainError> {
        let mut result = InsertManyResult::default();

        for (index, mut document) in batch.into_iter().enumerate() {
            stamp_new(&mut document, ObjectId::new(), Utc::now());

            match self.insert_row(&document).await {
                Ok(()) => result.inserted.push(document),
                Err(e @ sqlx::Error::Database(_)) => result.failures.push(InsertFailure {
                    index,
                    reason: e.to_string(),
                }),
                Err(e) => {
                    return Err(DomainError::storage(format!(
                        "Bulk insert aborted after {} documents: {}",
                        result.inserted_count(),
                        e
                    )));
                }
            }
        }

        Ok(result)
    }

    async fn update_by_id(
        &self,
        id: &ObjectId,
        changes: Document,
    ) -> Result<Option<Document>, DomainError> {
        let changes = prepare_changes(changes, Utc::now());
        let query = format!(
            "UPDATE {} SET data = data || $2 WHERE id = $1 RETURNING data",
            self.table()
        );

        let row = sqlx::query(&query)
            .bind(id.to_hex())
            .bind(Value::Object(changes))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.write_error("update document", e))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("PostgreSQL is unreachable: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_connect_timeout(5);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("collection", "users").is_ok());
        assert!(validate_identifier("field", "birth_date").is_ok());
        assert!(validate_identifier("collection", "").is_err());
        assert!(validate_identifier("collection", "1users").is_err());
        assert!(validate_identifier("collection", "users; DROP TABLE x").is_err());
    }

    #[test]
    fn test_compile_not_deleted_filter() {
        let filter = Filter::or(vec![
            Filter::eq("isDeleted", false),
            Filter::not_exists("isDeleted"),
        ]);

        let mut builder = SqlBuilder::default();
        let sql = builder.filter(&filter);

        assert_eq!(sql, "(((data -> $1) = $2) OR (NOT (data ? $3)))");
        assert_eq!(
            builder.params,
            vec![
                SqlParam::Text("isDeleted".to_string()),
                SqlParam::Json(json!(false)),
                SqlParam::Text("isDeleted".to_string()),
            ]
        );
    }

    #[test]
    fn test_compile_range_guards_type() {
        let mut builder = SqlBuilder::default();
        let sql = builder.filter(&Filter::condition("birthDate", FilterOperator::Gte, "1990"));

        assert_eq!(
            sql,
            "(jsonb_typeof((data -> $1)) = jsonb_typeof($2::jsonb) AND (data -> $1) >= $2)"
        );
        assert_eq!(builder.params.len(), 2);
    }

    #[test]
    fn test_compile_empty_groups() {
        let mut builder = SqlBuilder::default();
        assert_eq!(builder.filter(&Filter::all()), "TRUE");
        assert_eq!(builder.filter(&Filter::or(vec![])), "FALSE");
        assert!(builder.params.is_empty());
    }

    #[test]
    fn test_compile_ne_and_null() {
        let mut builder = SqlBuilder::default();
        assert_eq!(
            builder.filter(&Filter::ne("status", "Lead")),
            "((data -> $1) IS DISTINCT FROM $2)"
        );

        let mut builder = SqlBuilder::default();
        assert_eq!(
            builder.filter(&Filter::eq("status", Value::Null)),
            "((data -> $1) IS NULL OR (data -> $1) = 'null'::jsonb)"
        );
    }
}
