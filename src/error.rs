//! Error taxonomy.
//!
//! Normal episode termination is not an error: `done` is part of every step
//! outcome. Reversal requests are not errors either; they are dropped and the
//! previous heading is kept.

use std::path::PathBuf;

use thiserror::Error;

/// No free cell remains for food: the board is fully occupied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no free cell left for food ({occupied} of {cells} cells occupied)")]
pub struct StarvationError {
    pub occupied: usize,
    pub cells: usize,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Sample requested before the buffer holds enough transitions.
    #[error("requested {requested} transitions but only {available} stored")]
    InsufficientData { requested: usize, available: usize },
}

/// Failure to save or load estimator parameters.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed checkpoint {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Checkpoint parses but does not describe a usable estimator.
    #[error("checkpoint shape mismatch: {0}")]
    Shape(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("episode history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
