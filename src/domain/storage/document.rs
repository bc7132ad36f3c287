//! Schemaless documents and the fields the store manages itself

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use bson::oid::ObjectId;

/// A stored record: field name to JSON value
pub type Document = serde_json::Map<String, Value>;

/// Identifier field assigned on insert
pub const ID_FIELD: &str = "_id";

/// Timestamp set once on insert
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Timestamp refreshed on insert and on every update
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Fields callers may never overwrite through an update
pub const IMMUTABLE_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT_FIELD];

/// Render a timestamp the way every document stores it: RFC 3339, UTC, milliseconds
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read the identifier of a stored document
pub fn document_id(document: &Document) -> Option<ObjectId> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

/// Assign identity and timestamps to a document about to be inserted
pub fn stamp_new(document: &mut Document, id: ObjectId, now: DateTime<Utc>) {
    let timestamp = Value::String(format_timestamp(now));

    document.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
    document.insert(CREATED_AT_FIELD.to_string(), timestamp.clone());
    document.insert(UPDATED_AT_FIELD.to_string(), timestamp);
}

/// Strip store-managed fields from an update and refresh `updatedAt`
pub fn prepare_changes(mut changes: Document, now: DateTime<Utc>) -> Document {
    for field in IMMUTABLE_FIELDS {
        changes.remove(*field);
    }

    changes.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(format_timestamp(now)),
    );
    changes
}

/// Serde adapter for timestamps stored with [`format_timestamp`]
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;

        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Serde adapter keeping identifiers as 24-character hex strings on the wire
pub mod object_id_hex {
    use bson::oid::ObjectId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &ObjectId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::serde_helpers::serialize_object_id_as_hex_string(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ObjectId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ObjectId::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}
