//! Infrastructure layer - External service implementations

pub mod ingestion;
pub mod logging;
pub mod observability;
pub mod storage;
pub mod user;
