//! Error types for method dispatch.

use thiserror::Error;

/// Dispatch errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The method name is not a string, is forbidden, or is not part of the
    /// declared method set.
    #[error("Invalid or unsupported method: {0}")]
    InvalidMethod(String),

    /// A null or missing snapshot ordinal.
    #[error("Invalid snapshot id")]
    InvalidSnapshotId,

    /// Positional parameters did not match the method's signature.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The underlying chain operation failed.
    #[error(transparent)]
    Chain(#[from] cinder_chain::ChainError),
}

/// Result type for dispatch operations.
pub type ApiResult<T> = Result<T, ApiError>;
