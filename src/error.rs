use arrow_schema::{ArrowError, DataType};
use std::path::PathBuf;

/// Failure while fetching the remote CSV archive.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("I/O Error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while normalizing a single chunk.
#[derive(Debug, thiserror::Error)]
pub enum ChunkProcessingError {
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Columns normalize to the same name: {0}")]
    DuplicateColumn(String),
}

/// Failure while appending a chunk to the target table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("SQLite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Column {column} has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },
    #[error("Table {table} has no column {column}")]
    MissingColumn { table: String, column: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Config Error: {0}")]
    Config(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logger Error: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("Download Error: {0}")]
    Download(#[from] DownloadError),
    #[error("Store Error: {0}")]
    Store(#[from] LoadError),
    #[error("Read Error: {0}")]
    Read(#[source] ArrowError),
    #[error("Chunk {chunk} processing failed: {source}")]
    ChunkProcessing {
        chunk: usize,
        #[source]
        source: ChunkProcessingError,
    },
    #[error("Chunk {chunk} load failed: {source}")]
    Load {
        chunk: usize,
        #[source]
        source: LoadError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
