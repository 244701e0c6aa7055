//! Error types for block production.

use thiserror::Error;

/// Mining errors. Per-transaction execution failures are not errors; they
/// are reported as [`crate::TxFailure`] values.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Executor infrastructure failure.
    #[error("Execution error: {0}")]
    Evm(#[from] cinder_evm::EvmError),

    /// Trie error while assembling block roots.
    #[error("Trie error: {0}")]
    Trie(#[from] cinder_trie::TrieError),
}

/// Result type for mining operations.
pub type MinerResult<T> = Result<T, MinerError>;
