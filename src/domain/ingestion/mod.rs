//! Record ingestion domain types and traits
//!
//! This module provides:
//! - `HeaderMapping` for renaming source headers to document fields
//! - `RecordParser` trait for turning uploaded files into records
//! - Upload validation helpers

pub mod mapping;
pub mod parser;
pub mod validation;

pub use mapping::HeaderMapping;
pub use parser::RecordParser;
pub use validation::{is_csv_mime, sanitize_filename};

#[cfg(test)]
pub use parser::MockRecordParser;
