//! Error types for the storage layer.

use thiserror::Error;

/// Storage failures.
///
/// A batch that fails leaves nothing behind, so callers treat these as
/// fatal for the operation that staged the writes rather than retrying
/// key by key.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The RocksDB backend rejected an operation.
    #[error("Backend error: {0}")]
    Backend(#[from] rocksdb::Error),

    /// A keyspace handle was requested that the store was not opened with.
    #[error("Unknown keyspace: {0}")]
    UnknownKeyspace(&'static str),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
