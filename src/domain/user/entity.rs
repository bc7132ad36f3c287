//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::{
    BIRTH_DATE_FIELD, EMAIL_FIELD, FIRST_NAME_FIELD, IS_DELETED_FIELD, LAST_NAME_FIELD,
    MARKETING_SOURCE_FIELD, PHONE_FIELD, STATUS_FIELD,
};
use crate::domain::storage::{format_timestamp, object_id_hex, timestamp, Document, ObjectId};
use crate::domain::DomainError;

/// A user record as stored and as returned on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned identifier
    #[serde(rename = "_id", with = "object_id_hex")]
    id: ObjectId,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marketing_source: Option<String>,
    #[serde(with = "timestamp")]
    birth_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    /// Legacy documents without the flag are not deleted
    #[serde(default)]
    is_deleted: bool,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    updated_at: DateTime<Utc>,
}

impl User {
    /// Decode a stored document
    pub fn from_document(document: Document) -> Result<Self, DomainError> {
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            DomainError::internal(format!("Stored user document is malformed: {}", e))
        })
    }

    // Getters

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn marketing_source(&self) -> Option<&str> {
        self.marketing_source.as_deref()
    }

    pub fn birth_date(&self) -> DateTime<Utc> {
        self.birth_date
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Fields accepted when creating a user
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub marketing_source: Option<String>,
    pub birth_date: DateTime<Utc>,
    pub status: Option<String>,
}

impl NewUser {
    /// Build the document to insert. `isDeleted` is always false.
    pub fn into_document(self) -> Document {
        let mut document = Document::new();

        document.insert(FIRST_NAME_FIELD.to_string(), Value::String(self.first_name));
        document.insert(LAST_NAME_FIELD.to_string(), Value::String(self.last_name));
        document.insert(EMAIL_FIELD.to_string(), Value::String(self.email));
        document.insert(PHONE_FIELD.to_string(), Value::String(self.phone));
        if let Some(source) = self.marketing_source {
            document.insert(MARKETING_SOURCE_FIELD.to_string(), Value::String(source));
        }
        document.insert(
            BIRTH_DATE_FIELD.to_string(),
            Value::String(format_timestamp(self.birth_date)),
        );
        if let Some(status) = self.status {
            document.insert(STATUS_FIELD.to_string(), Value::String(status));
        }
        document.insert(IS_DELETED_FIELD.to_string(), Value::Bool(false));

        document
    }
}

/// A partial update: every present field overwrites the stored one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub marketing_source: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub is_deleted: Option<bool>,
}

impl UserPatch {
    /// Patch that only marks the user as deleted
    pub fn soft_delete() -> Self {
        Self {
            is_deleted: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Changes to hand to the store
    pub fn into_document(self) -> Document {
        let mut document = Document::new();

        let strings = [
            (FIRST_NAME_FIELD, self.first_name),
            (LAST_NAME_FIELD, self.last_name),
            (EMAIL_FIELD, self.email),
            (PHONE_FIELD, self.phone),
            (MARKETING_SOURCE_FIELD, self.marketing_source),
            (STATUS_FIELD, self.status),
        ];
        for (field, value) in strings {
            if let Some(value) = value {
                document.insert(field.to_string(), Value::String(value));
            }
        }

        if let Some(birth_date) = self.birth_date {
            document.insert(
                BIRTH_DATE_FIELD.to_string(),
                Value::String(format_timestamp(birth_date)),
            );
        }
        if let Some(is_deleted) = self.is_deleted {
            document.insert(IS_DELETED_FIELD.to_string(), Value::Bool(is_deleted));
        }

        document
    }
}
