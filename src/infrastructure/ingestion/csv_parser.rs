//! CSV record parser

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecordsIntoIter};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ingestion::{HeaderMapping, RecordParser};
use crate::domain::storage::Document;
use crate::domain::DomainError;

/// Errors raised while reading a CSV file
#[derive(Debug, Error)]
pub enum CsvIngestionError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV: {0}")]
    Malformed(#[from] csv::Error),
}

impl From<CsvIngestionError> for DomainError {
    fn from(error: CsvIngestionError) -> Self {
        match error {
            CsvIngestionError::Open { .. } => DomainError::ingestion_failed(error.to_string()),
            CsvIngestionError::Malformed(_) => DomainError::validation(error.to_string()),
        }
    }
}

/// Streams CSV rows as documents keyed by mapped header names
pub struct MappedRecords<R: Read> {
    rows: StringRecordsIntoIter<R>,
    targets: Vec<Option<String>>,
}

impl<R: Read> Iterator for MappedRecords<R> {
    type Item = Result<Document, CsvIngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        let document = self
            .targets
            .iter()
            .zip(row.iter())
            .filter_map(|(target, cell)| {
                target
                    .as_ref()
                    .map(|field| (field.clone(), Value::String(cell.to_string())))
            })
            .collect();

        Some(Ok(document))
    }
}

/// Parses comma-separated files into records, renaming headers through a [`HeaderMapping`]
#[derive(Debug, Clone, Default)]
pub struct CsvRecordParser {
    mapping: HeaderMapping,
}

impl CsvRecordParser {
    pub fn new(mapping: HeaderMapping) -> Self {
        Self { mapping }
    }

    /// Start reading records. The first row is the header row.
    fn records<R: Read>(&self, reader: R) -> Result<MappedRecords<R>, CsvIngestionError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let targets = reader
            .headers()?
            .iter()
            .map(|header| self.mapping.target(header).map(str::to_string))
            .collect();

        Ok(MappedRecords {
            rows: reader.into_records(),
            targets,
        })
    }

    fn read_all<R: Read>(&self, reader: R) -> Result<Vec<Document>, CsvIngestionError> {
        self.records(reader)?.collect()
    }
}

#[async_trait]
impl RecordParser for CsvRecordParser {
    async fn parse_file(&self, path: &Path) -> Result<Vec<Document>, DomainError> {
        let parser = self.clone();
        let path = path.to_path_buf();

        let records = tokio::task::spawn_blocking(move || {
            let file = File::open(&path).map_err(|source| CsvIngestionError::Open {
                path: path.clone(),
                source,
            })?;
            parser.read_all(file)
        })
        .await
        .map_err(|e| DomainError::internal(format!("CSV parsing task failed: {}", e)))??;

        tracing::debug!(records = records.len(), "Parsed CSV file");
        Ok(records)
    }
}
