//! Record ingestion infrastructure

mod csv_parser;

pub use csv_parser::{CsvIngestionError, CsvRecordParser, MappedRecords};
