//! RocksDB-backed store.

use crate::{batch::BatchOp, Storage, StorageError, StorageResult, WriteBatch};
use rocksdb::{BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The simulator's keyspaces, one column family each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// RLP-encoded blocks indexed by big-endian block number.
    Blocks,
    /// Block hash -> big-endian block number.
    BlockHashIndex,
    /// Per-block log records indexed by big-endian block number.
    BlockLogs,
    /// Stored transactions indexed by transaction hash.
    Transactions,
    /// Serialized receipts indexed by transaction hash.
    Receipts,
    /// Merkle-Patricia trie nodes indexed by node hash.
    TrieNodes,
    /// Chain cursor and bookkeeping.
    Metadata,
    /// Default column family (required by RocksDB).
    Default,
}

impl ColumnFamily {
    /// Get the string name of the column family.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Blocks => "blocks",
            ColumnFamily::BlockHashIndex => "block_hash_index",
            ColumnFamily::BlockLogs => "block_logs",
            ColumnFamily::Transactions => "transactions",
            ColumnFamily::Receipts => "receipts",
            ColumnFamily::TrieNodes => "trie_nodes",
            ColumnFamily::Metadata => "metadata",
            ColumnFamily::Default => "default",
        }
    }

    /// Get all column families.
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::Blocks,
            ColumnFamily::BlockHashIndex,
            ColumnFamily::BlockLogs,
            ColumnFamily::Transactions,
            ColumnFamily::Receipts,
            ColumnFamily::TrieNodes,
            ColumnFamily::Metadata,
            ColumnFamily::Default,
        ]
    }
}

/// RocksDB database wrapper.
///
/// Cloning shares the handle; the coordinator, the trie and the managers
/// all write through the same database.
pub struct Database {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);

        // One shared block cache keeps memory bounded across keyspaces; a
        // simulator workload never justifies per-family caches.
        let block_cache = Cache::new_lru_cache(64 * 1024 * 1024);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

                let mut block_opts = BlockBasedOptions::default();
                block_opts.set_block_cache(&block_cache);
                cf_opts.set_block_based_table_factory(&block_opts);

                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        debug!("Database opened");

        Ok(Self { db: Arc::new(db) })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> StorageResult<()> {
        for cf in ColumnFamily::all() {
            if let Some(handle) = self.db.cf_handle(cf.name()) {
                self.db.flush_cf(&handle)?;
            }
        }
        Ok(())
    }

    fn handle(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf.name())
            .ok_or(StorageError::UnknownKeyspace(cf.name()))
    }
}

impl Storage for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let handle = self.handle(cf)?;
        Ok(self.db.get_cf(&handle, key)?)
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let handle = self.handle(cf)?;
        self.db.put_cf(&handle, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        let handle = self.handle(cf)?;
        self.db.delete_cf(&handle, key)?;
        Ok(())
    }

    fn multi_get(&self, cf: ColumnFamily, keys: &[&[u8]]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        let handle = self.handle(cf)?;
        self.db
            .multi_get_cf(keys.iter().map(|key| (&handle, *key)))
            .into_iter()
            .map(|value| value.map_err(StorageError::from))
            .collect()
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for op in batch.into_ops() {
            match op {
                BatchOp::Put { cf, key, value } => {
                    let handle = self.handle(cf)?;
                    rocks_batch.put_cf(&handle, key, value);
                }
                BatchOp::Delete { cf, key } => {
                    let handle = self.handle(cf)?;
                    rocks_batch.delete_cf(&handle, key);
                }
            }
        }

        self.db.write(rocks_batch)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        Database::flush(self)
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let handle = self.handle(cf)?;
        let iter = self.db.iterator_cf(&handle, rocksdb::IteratorMode::Start);

        let collected: Vec<_> = iter
            .filter_map(|r| r.ok())
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();

        Ok(Box::new(collected.into_iter()))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_fresh() -> (Database, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        (db, tmp)
    }

    #[test]
    fn put_get_delete_round_trip() {
        let (db, _tmp) = open_fresh();

        db.put(ColumnFamily::Metadata, b"latest", &9u64.to_be_bytes())
            .unwrap();
        assert_eq!(
            db.get(ColumnFamily::Metadata, b"latest").unwrap(),
            Some(9u64.to_be_bytes().to_vec())
        );
        assert!(db.contains(ColumnFamily::Metadata, b"latest").unwrap());

        db.delete(ColumnFamily::Metadata, b"latest").unwrap();
        assert_eq!(db.get(ColumnFamily::Metadata, b"latest").unwrap(), None);
    }

    #[test]
    fn batch_lands_across_keyspaces() {
        let (db, _tmp) = open_fresh();

        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Blocks, 1u64.to_be_bytes().as_slice(), b"block");
        batch.put(ColumnFamily::Transactions, b"tx", b"record");
        batch.put(ColumnFamily::Receipts, b"tx", b"receipt");
        batch.put(ColumnFamily::Metadata, b"latest", 1u64.to_be_bytes().as_slice());
        db.write_batch(batch).unwrap();

        assert_eq!(
            db.get(ColumnFamily::Blocks, &1u64.to_be_bytes()).unwrap(),
            Some(b"block".to_vec())
        );
        assert_eq!(
            db.get(ColumnFamily::Transactions, b"tx").unwrap(),
            Some(b"record".to_vec())
        );
        assert_eq!(
            db.get(ColumnFamily::Receipts, b"tx").unwrap(),
            Some(b"receipt".to_vec())
        );
        assert_eq!(
            db.get(ColumnFamily::Metadata, b"latest").unwrap(),
            Some(1u64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn multi_get_keeps_key_order_and_gaps() {
        let (db, _tmp) = open_fresh();

        db.put(ColumnFamily::TrieNodes, b"a", b"1").unwrap();
        db.put(ColumnFamily::TrieNodes, b"c", b"3").unwrap();

        let values = db
            .multi_get(ColumnFamily::TrieNodes, &[b"a", b"b", b"c"])
            .unwrap();
        assert_eq!(
            values,
            vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]
        );
    }

    #[test]
    fn iteration_is_key_ordered() {
        let (db, _tmp) = open_fresh();

        for number in [3u64, 1, 2] {
            db.put(ColumnFamily::Blocks, &number.to_be_bytes(), b"b")
                .unwrap();
        }

        let keys: Vec<_> = db
            .iter(ColumnFamily::Blocks)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                1u64.to_be_bytes().to_vec(),
                2u64.to_be_bytes().to_vec(),
                3u64.to_be_bytes().to_vec(),
            ]
        );

        let (last_key, _) = db.last(ColumnFamily::Blocks).unwrap().unwrap();
        assert_eq!(last_key, 3u64.to_be_bytes().to_vec());
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = TempDir::new().unwrap();
        {
            let db = Database::open(tmp.path()).unwrap();
            db.put(ColumnFamily::Metadata, b"latest", &7u64.to_be_bytes())
                .unwrap();
            db.flush().unwrap();
        }
        let db = Database::open(tmp.path()).unwrap();
        assert_eq!(
            db.get(ColumnFamily::Metadata, b"latest").unwrap(),
            Some(7u64.to_be_bytes().to_vec())
        );
    }
}
