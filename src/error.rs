//! Error types for the compendium library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum CompendiumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no data: {0}")]
    NoData(String),

    #[error("study '{0}' not found: no samples")]
    StudyNotFound(String),

    #[error("sample '{0}' not found")]
    SampleNotFound(String),

    #[error("table '{0}' not found")]
    MissingTable(String),

    #[error("missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("computation error: {0}")]
    Computation(String),

    #[error("cache entry corrupt: {0}")]
    CacheCorrupt(String),

    #[error("empty data: {0}")]
    EmptyData(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, CompendiumError>;
