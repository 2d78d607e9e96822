// File: src/error.rs
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the batching, training and persistence layers.
#[derive(Error, Debug)]
pub enum SlangError {
    /// A stream record that could not be turned into `(timestamp, body)`.
    #[error("malformed record at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Similarity query on a word the model has never retained.
    #[error("word '{0}' is not in the model vocabulary")]
    UnknownWord(String),

    /// Archive, snapshot or glossary I/O failure.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SlangError>;

impl SlangError {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage { path: path.into(), source }
    }

    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse { line, reason: reason.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for SlangError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for SlangError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
