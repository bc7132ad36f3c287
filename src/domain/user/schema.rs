//! Storage schema for the users collection
//!
//! Casts raw records into documents the store accepts, and query-string
//! values into typed filter values.

use serde_json::Value;

use super::entity::NewUser;
use super::validation::{parse_bool, parse_iso_date, validate_not_empty, UserValidationError};
use crate::domain::storage::{
    format_timestamp, CollectionOptions, Document, Filter, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};

/// Collection holding user documents
pub const USERS_COLLECTION: &str = "users";

pub const FIRST_NAME_FIELD: &str = "firstName";
pub const LAST_NAME_FIELD: &str = "lastName";
pub const EMAIL_FIELD: &str = "email";
pub const PHONE_FIELD: &str = "phone";
pub const MARKETING_SOURCE_FIELD: &str = "marketingSource";
pub const BIRTH_DATE_FIELD: &str = "birthDate";
pub const STATUS_FIELD: &str = "status";
pub const IS_DELETED_FIELD: &str = "isDeleted";

/// Fields with a hard uniqueness constraint in the store
pub const UNIQUE_FIELDS: &[&str] = &[EMAIL_FIELD, PHONE_FIELD];

const DATE_FIELDS: &[&str] = &[BIRTH_DATE_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Collection settings for a store holding users
pub fn collection_options(name: impl Into<String>) -> CollectionOptions {
    UNIQUE_FIELDS
        .iter()
        .fold(CollectionOptions::new(name), |options, field| {
            options.with_unique_field(*field)
        })
}

/// Documents visible in default listings: `isDeleted` false or absent
pub fn not_deleted() -> Filter {
    Filter::or(vec![
        Filter::eq(IS_DELETED_FIELD, false),
        Filter::not_exists(IS_DELETED_FIELD),
    ])
}

fn required_string(record: &Document, field: &str) -> Result<String, UserValidationError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(UserValidationError::MissingField(field.to_string())),
        Some(Value::String(value)) => {
            validate_not_empty(field, value)?;
            Ok(value.clone())
        }
        Some(_) => Err(UserValidationError::NotAString(field.to_string())),
    }
}

fn optional_string(record: &Document, field: &str) -> Result<Option<String>, UserValidationError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(UserValidationError::NotAString(field.to_string())),
    }
}

/// Cast a raw record against the user schema.
///
/// Required strings must be present and non-empty, `birthDate` must be an
/// ISO date. Fields outside the schema are dropped and `isDeleted` is false.
pub fn cast_new_user(record: &Document) -> Result<NewUser, UserValidationError> {
    let birth_date = required_string(record, BIRTH_DATE_FIELD)?;

    Ok(NewUser {
        first_name: required_string(record, FIRST_NAME_FIELD)?,
        last_name: required_string(record, LAST_NAME_FIELD)?,
        email: required_string(record, EMAIL_FIELD)?,
        phone: required_string(record, PHONE_FIELD)?,
        marketing_source: optional_string(record, MARKETING_SOURCE_FIELD)?,
        birth_date: parse_iso_date(BIRTH_DATE_FIELD, &birth_date)?,
        status: optional_string(record, STATUS_FIELD)?,
    })
}

/// Cast a raw record into an insertable document
pub fn cast_new_document(record: &Document) -> Result<Document, UserValidationError> {
    cast_new_user(record).map(NewUser::into_document)
}

/// Cast a query-string value to the type stored under `field`
pub fn cast_filter_value(field: &str, raw: &str) -> Result<Value, UserValidationError> {
    if field == IS_DELETED_FIELD {
        return parse_bool(field, raw).map(Value::Bool);
    }

    if DATE_FIELDS.contains(&field) {
        return parse_iso_date(field, raw).map(|dt| Value::String(format_timestamp(dt)));
    }

    Ok(Value::String(raw.to_string()))
}
