//! # cinder-trie
//!
//! Checkpointable Merkle-Patricia trie over the storage layer's `TrieNodes`
//! keyspace.
//!
//! Nodes are RLP-encoded and addressed by the keccak of their encoding, so
//! the trie is content-addressed: repointing the root to any previously
//! committed root restores that state, and superseded nodes are unreferenced
//! garbage rather than corruption.
//!
//! Mutations accumulate in an in-memory overlay until [`MerkleTrie::commit`]
//! folds them into a storage batch. Checkpoints capture the root and the
//! overlay watermark; reverting a checkpoint restores both.

mod error;
mod nibbles;
mod node;
mod trie;

pub use error::{TrieError, TrieResult};
pub use trie::MerkleTrie;

use cinder_storage::{MemoryDatabase, Storage};
use cinder_types::H256;
use std::sync::Arc;

/// Compute the root of a trie built from `items` in one shot.
///
/// Used for the per-block transaction and receipt tries, which are keyed by
/// RLP-encoded position.
pub fn ordered_trie_root<I, V>(items: I) -> H256
where
    I: IntoIterator<Item = V>,
    V: AsRef<[u8]>,
{
    let storage: Arc<dyn Storage> = Arc::new(MemoryDatabase::new());
    let mut trie = MerkleTrie::empty(storage);
    for (index, value) in items.into_iter().enumerate() {
        let key = rlp::encode(&(index as u64)).to_vec();
        trie.insert(&key, value.as_ref().to_vec())
            .expect("in-memory trie insert cannot fail");
    }
    trie.root()
}
