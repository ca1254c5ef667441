//! Error taxonomy shared by the parsers, the index and the search pipeline.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A corpus or query record could not be read. Parsers recover from
    /// these locally; the variant exists so callers can report them.
    #[error("malformed record {record}: {reason}")]
    Parse { record: String, reason: String },

    /// Invalid settings or unusable input paths. Always fatal, raised
    /// before any document or query is processed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Underlying storage or stream failure.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// Persisted index files could not be encoded or decoded.
    #[error("storage encoding failure: {0}")]
    Serialization(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
