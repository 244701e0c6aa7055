//! Error types for the state trie.

use cinder_types::H256;
use thiserror::Error;

/// Trie errors.
#[derive(Error, Debug)]
pub enum TrieError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] cinder_storage::StorageError),

    /// A referenced node is absent from the overlay and storage.
    #[error("Missing trie node: {0:?}")]
    MissingNode(H256),

    /// A stored node failed to decode.
    #[error("Corrupt trie node {hash:?}: {reason}")]
    CorruptNode { hash: H256, reason: String },

    /// The root cannot be repointed while a checkpoint is open.
    #[error("Cannot set trie root with {0} open checkpoint(s)")]
    CheckpointOpen(usize),

    /// Commit or revert without a matching checkpoint.
    #[error("No open checkpoint")]
    NoCheckpoint,
}

/// Result type for trie operations.
pub type TrieResult<T> = Result<T, TrieError>;
