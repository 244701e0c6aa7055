//! # cinder-storage
//!
//! Storage layer for the Cinder simulator.
//!
//! This crate provides a RocksDB-based storage abstraction with support for:
//! - Column families for the simulator's keyspaces
//! - Atomic batch writes
//! - An in-memory backend for tests and injected stores
//!
//! ## Column Families
//!
//! - `Blocks`: RLP blocks indexed by big-endian block number
//! - `BlockHashIndex`: block hash -> block number
//! - `BlockLogs`: per-block log records indexed by block number
//! - `Transactions`: stored transactions indexed by transaction hash
//! - `Receipts`: serialized receipts indexed by transaction hash
//! - `TrieNodes`: Merkle-Patricia trie nodes indexed by node hash
//! - `Metadata`: chain cursor and bookkeeping

mod batch;
mod database;
mod error;
mod memory;

pub use batch::{BatchOp, WriteBatch};
pub use database::{ColumnFamily, Database};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDatabase;

/// Byte-keyed, keyspace-partitioned store.
///
/// Object-safe so the chain runs unchanged over RocksDB or the in-memory
/// backend. Single-key writes exist for convenience; anything touching more
/// than one record goes through [`Storage::write_batch`], which commits
/// atomically.
pub trait Storage: Send + Sync {
    /// Get a value by key from a column family.
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair into a column family.
    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a column family.
    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists in a column family.
    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Get several values at once, preserving key order; absent keys yield
    /// `None` in their slot.
    fn multi_get(&self, cf: ColumnFamily, keys: &[&[u8]]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(cf, key)).collect()
    }

    /// Execute a batch of writes atomically.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Iterate a column family in ascending key order.
    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>>;

    /// Last key-value pair of a column family in key order, if any.
    fn last(&self, cf: ColumnFamily) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.iter(cf)?.last())
    }

    /// Flush pending writes to durable storage, where the backend buffers.
    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}
