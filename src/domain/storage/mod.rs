//! Storage domain - document collections with filter/sort/paginate queries

mod document;
mod query;
mod repository;

pub use document::{
    document_id, format_timestamp, object_id_hex, prepare_changes, stamp_new, timestamp, Document,
    CREATED_AT_FIELD, ID_FIELD, IMMUTABLE_FIELDS, UPDATED_AT_FIELD,
};
pub use bson::oid::ObjectId;
pub use query::{
    Filter, FilterCondition, FilterOperator, FindQuery, SortDirection, SortOrder,
};
pub use repository::{CollectionOptions, DocumentStore, InsertFailure, InsertManyResult};

#[cfg(test)]
pub use repository::MockDocumentStore;
