use std::io;

use thiserror::Error;

use crate::types::{PageTitle, TableName};

/// Error type for codec, lookup, indexing, and persistence failures.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("invalid spatial key '{key}': {reason}")]
    InvalidSpatialKey { key: String, reason: String },
    #[error("coordinate out of range: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("could not parse date '{input}': {reason}")]
    DateParse { input: String, reason: String },
    #[error("lookup table '{table}' is unavailable: {reason}")]
    LookupUnavailable { table: TableName, reason: String },
    #[error("lookup table '{table}' returned a corrupt payload: {details}")]
    LookupCorrupt { table: TableName, details: String },
    #[error("no link graph stored for page '{0}'")]
    MissingLinkGraph(PageTitle),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
