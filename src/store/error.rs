use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the embedded document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store not reachable at {}", path.display())]
    Unreachable { path: PathBuf },

    #[error("invalid collection name `{0}`")]
    InvalidName(String),

    #[error("collection `{0}` not found")]
    CollectionNotFound(String),

    #[error("collection `{0}` already exists")]
    CollectionExists(String),

    #[error("unsupported time field `{0}`; time-series collections are keyed on `date`")]
    UnsupportedTimeField(String),

    #[error("field `{0}` cannot be indexed")]
    UnsupportedIndexField(String),

    #[error("metric columns of the batch do not match collection `{collection}`")]
    SchemaMismatch { collection: String },

    #[error("refusing to insert an empty batch into `{0}`")]
    EmptyInsert(String),

    #[error("corrupt segment {}: {detail}", path.display())]
    CorruptSegment { path: PathBuf, detail: String },

    #[error("invalid collection metadata at {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("arrow error")]
    Arrow(#[from] ArrowError),

    #[error("parquet error")]
    Parquet(#[from] ParquetError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        StoreError::CorruptSegment {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
