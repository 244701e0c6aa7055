//! Error types for the transaction pool.

use cinder_types::{H256, U256};
use thiserror::Error;

/// Pool admission errors, surfaced to the caller of `queue_transaction`.
#[derive(Error, Debug)]
pub enum MempoolError {
    /// Transaction already pooled.
    #[error("Transaction already in pool: {0:?}")]
    AlreadyKnown(H256),

    /// Nonce below the sender's current account nonce.
    #[error("Nonce too low: account nonce is {expected}, got {actual}")]
    NonceTooLow { expected: u64, actual: u64 },

    /// Sender cannot cover `value + gas_limit * gas_price`.
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: U256, required: U256 },

    /// Pool over capacity.
    #[error("Pool full: {count} transactions, max {max}")]
    Full { count: usize, max: usize },

    /// Replacement transaction does not outbid the pooled one.
    #[error("Replacement underpriced: pooled gas price {pooled}, got {offered}")]
    ReplacementUnderpriced { pooled: U256, offered: U256 },

    /// State read failure during validation.
    #[error("State error: {0}")]
    State(#[from] cinder_evm::EvmError),
}

/// Result type for pool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;
