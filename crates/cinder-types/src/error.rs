//! Error types for chain data structures.

use thiserror::Error;

/// Errors raised while constructing or decoding chain types.
#[derive(Error, Debug)]
pub enum TypesError {
    /// Signature values are out of range or do not recover an address.
    #[error("Invalid transaction signature")]
    InvalidSignature,

    /// RLP decoding failure.
    #[error("RLP decoding failed: {0}")]
    Rlp(#[from] rlp::DecoderError),
}

/// Result type for chain type operations.
pub type TypesResult<T> = Result<T, TypesError>;
