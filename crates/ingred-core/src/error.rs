use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while splitting, extracting or compressing ingredient text
#[derive(Error, Debug)]
pub enum IngredError {
    /// I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to read or write a delimited table
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to encode or decode a JSON record
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be parsed
    #[error("Failed to parse config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration holds a value that cannot be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required column is absent from the input header
    #[error("Column '{0}' not found in input header")]
    MissingColumn(String),

    /// A search pattern could not be compiled
    #[error("Invalid pattern for '{text}': {source}")]
    InvalidPattern {
        text: String,
        #[source]
        source: regex::Error,
    },

    /// An ingredient line exceeds the configured length limit
    #[error("Line has {len} characters, limit is {limit}")]
    LineTooLong { len: usize, limit: usize },

    /// The translation collaborator failed for a request
    #[error("Translation failed: {0}")]
    Translation(String),
}

/// A specialized Result type for ingredient processing operations
pub type Result<T> = std::result::Result<T, IngredError>;
