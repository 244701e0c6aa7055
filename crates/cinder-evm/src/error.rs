//! Error types for transaction execution.

use cinder_types::U256;
use thiserror::Error;

/// Infrastructure errors while executing.
#[derive(Error, Debug)]
pub enum EvmError {
    /// Trie error.
    #[error("Trie error: {0}")]
    Trie(#[from] cinder_trie::TrieError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] cinder_storage::StorageError),

    /// A stored account failed to decode.
    #[error("Corrupt account record: {0}")]
    CorruptAccount(rlp::DecoderError),

    /// Unknown hardfork identifier.
    #[error("Unknown hardfork: {0}")]
    UnknownHardfork(String),
}

/// Result type for executor operations.
pub type EvmResult<T> = Result<T, EvmError>;

/// Failures of the transaction itself; the world state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Sender balance below `value + gas_limit * gas_price`.
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: U256, required: U256 },

    /// Transaction nonce does not match the sender's account nonce.
    #[error("Invalid nonce: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },

    /// Gas limit below the transaction's intrinsic cost.
    #[error("Intrinsic gas too low: limit {limit}, required {required}")]
    IntrinsicGas { limit: u64, required: u64 },

    /// Deployed code would exceed the size cap.
    #[error("Contract code size {size} exceeds maximum {max}")]
    CodeSizeExceeded { size: usize, max: usize },
}
