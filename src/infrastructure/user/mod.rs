//! User infrastructure module
//!
//! The user service that orchestrates the document store and record parsing.

mod service;

pub use service::{BulkInsertSummary, ListUsersParams, UserService};
