//! Error types for the ingestion engine

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ingestion::types::RawSource;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Raw file, store or table absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed delimited text
    #[error("parse error in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// Row arity differs from header arity
    #[error("row {row} has {found} values, expected {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Failure while reading, typing or loading one raw source
    #[error("failed to integrate {source_ref}: {source}")]
    Integration {
        source_ref: RawSource,
        #[source]
        source: Box<EngineError>,
    },

    /// Unknown attribute in a query
    #[error("query error: {0}")]
    Query(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Another table in the store has the same name up to ASCII case
    #[error("table '{table}' in store {store} clashes with existing table '{existing}'")]
    TableConflict {
        store: String,
        table: String,
        existing: String,
    },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn integration(source_ref: &RawSource, err: EngineError) -> Self {
        match err {
            // already attached to a source
            EngineError::Integration { .. } => err,
            other => EngineError::Integration {
                source_ref: source_ref.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, unwrapping any integration context
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Integration { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
