//! Library error types.
//!
//! Commands and `main.rs` wrap these in `anyhow` with added context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised at the encoding boundary.
///
/// Any of these aborts the whole conversion: the payload has no resync
/// marker, so a truncated field corrupts every later section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Negative value {0} cannot be encoded")]
    NegativeValue(String),

    #[error("Value {value} does not fit into {bits} bits")]
    Overflow { value: u64, bits: u32 },
}

/// Errors that can occur while loading an event source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while loading or rendering the visualization template
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {path}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template is missing required placeholder ${{{0}}}")]
    MissingPlaceholder(String),

    #[error("Template references unknown placeholder ${{{0}}}")]
    UnknownPlaceholder(String),

    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Errors that abort a conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Sample falls into bucket {index}, beyond the limit of {limit} buckets")]
    TooManyBuckets { index: u64, limit: usize },
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Template rendering failed: {0}")]
    Template(#[from] TemplateError),
}
