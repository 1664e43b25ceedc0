use std::path::PathBuf;
use thiserror::Error;

/// Errors propagated by the store path, metadata loading and configuration.
///
/// Retrieval problems caused by missing data are not errors; they are
/// reported through [`crate::placement::RetrieveOutcome`].
#[derive(Error, Debug)]
pub enum ScatterError {
    #[error("source not found: {path}: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing chunk {chunk} to node {node}: {source}")]
    NodeWriteFailure {
        node: String,
        chunk: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt metadata document {path}: {source}")]
    CorruptMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("metadata I/O on {path}: {source}")]
    MetadataIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed reading chunk {chunk} from node {node}: {source}")]
    ChunkRead {
        node: String,
        chunk: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScatterError>;
