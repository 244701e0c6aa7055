//! Error types for the blockchain coordinator.

use cinder_evm::VmError;
use cinder_types::H256;
use thiserror::Error;

/// Blockchain errors.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Storage error. Batches are atomic, so a failed commit leaves no
    /// partial block behind.
    #[error("Storage error: {0}")]
    Storage(#[from] cinder_storage::StorageError),

    /// Trie error. Includes the open-checkpoint rejection a revert hits
    /// when it races a mid-execution savepoint.
    #[error("Trie error: {0}")]
    Trie(#[from] cinder_trie::TrieError),

    /// Executor infrastructure error.
    #[error("Execution error: {0}")]
    Evm(#[from] cinder_evm::EvmError),

    /// Pool admission rejection.
    #[error("Transaction rejected: {0}")]
    Pool(#[from] cinder_mempool::MempoolError),

    /// Miner error.
    #[error("Mining error: {0}")]
    Miner(#[from] cinder_miner::MinerError),

    /// Chain type error.
    #[error("{0}")]
    Types(#[from] cinder_types::TypesError),

    /// A transaction queued in legacy instamine mode failed in the VM.
    /// The hash is attached when `vm_errors_on_rpc_response` is set.
    #[error("Transaction failed: {error}")]
    TransactionFailed {
        hash: Option<H256>,
        #[source]
        error: VmError,
    },

    /// A block referenced by number or hash is not stored.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// A persisted record failed to decode.
    #[error("Corrupt chain record: {0}")]
    CorruptRecord(rlp::DecoderError),

    /// Operation requires a running chain.
    #[error("Blockchain is not running (phase {0})")]
    NotRunning(&'static str),
}

/// Result type for blockchain operations.
pub type ChainResult<T> = Result<T, ChainError>;
