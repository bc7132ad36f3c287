//! User domain
//!
//! The user entity, its storage schema, and field validation rules.

mod entity;
pub mod schema;
mod validation;

pub use entity::{NewUser, User, UserPatch};
pub use schema::{
    cast_filter_value, cast_new_document, collection_options, not_deleted, USERS_COLLECTION,
};
pub use validation::{
    parse_bool, parse_iso_date, validate_email, validate_not_empty, validate_phone,
    UserValidationError,
};
