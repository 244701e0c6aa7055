//! In-memory storage backend.

use crate::{batch::BatchOp, ColumnFamily, Storage, StorageResult, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;

type Keyspace = BTreeMap<Vec<u8>, Vec<u8>>;

/// A `BTreeMap`-backed [`Storage`] implementation.
///
/// Used by tests and by callers that inject a store instead of a database
/// path. Keys iterate in the same ascending order RocksDB provides, so the
/// chain behaves identically over either backend.
#[derive(Default)]
pub struct MemoryDatabase {
    spaces: RwLock<BTreeMap<&'static str, Keyspace>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryDatabase {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .spaces
            .read()
            .get(cf.name())
            .and_then(|space| space.get(key).cloned()))
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.spaces
            .write()
            .entry(cf.name())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        if let Some(space) = self.spaces.write().get_mut(cf.name()) {
            space.remove(key);
        }
        Ok(())
    }

    fn multi_get(&self, cf: ColumnFamily, keys: &[&[u8]]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        let spaces = self.spaces.read();
        let space = spaces.get(cf.name());
        Ok(keys
            .iter()
            .map(|key| space.and_then(|space| space.get(*key).cloned()))
            .collect())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut spaces = self.spaces.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { cf, key, value } => {
                    spaces.entry(cf.name()).or_default().insert(key, value);
                }
                BatchOp::Delete { cf, key } => {
                    if let Some(space) = spaces.get_mut(cf.name()) {
                        space.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let collected: Vec<_> = self
            .spaces
            .read()
            .get(cf.name())
            .map(|space| {
                space
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(collected.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyspaces_are_isolated() {
        let db = MemoryDatabase::new();

        db.put(ColumnFamily::Blocks, b"key", b"block").unwrap();
        assert_eq!(
            db.get(ColumnFamily::Blocks, b"key").unwrap(),
            Some(b"block".to_vec())
        );
        assert_eq!(db.get(ColumnFamily::Transactions, b"key").unwrap(), None);

        db.delete(ColumnFamily::Blocks, b"key").unwrap();
        assert_eq!(db.get(ColumnFamily::Blocks, b"key").unwrap(), None);
    }

    #[test]
    fn batch_applies_in_staging_order() {
        let db = MemoryDatabase::new();

        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Blocks, vec![2u8], b"two");
        batch.put(ColumnFamily::Blocks, vec![1u8], b"one");
        batch.put(ColumnFamily::Blocks, vec![3u8], b"three");
        batch.delete(ColumnFamily::Blocks, vec![2u8]);
        db.write_batch(batch).unwrap();

        let keys: Vec<_> = db
            .iter(ColumnFamily::Blocks)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![vec![1u8], vec![3u8]]);
    }

    #[test]
    fn multi_get_matches_single_gets() {
        let db = MemoryDatabase::new();
        db.put(ColumnFamily::Receipts, b"x", b"1").unwrap();
        db.put(ColumnFamily::Receipts, b"z", b"3").unwrap();

        let values = db
            .multi_get(ColumnFamily::Receipts, &[b"x", b"y", b"z"])
            .unwrap();
        assert_eq!(
            values,
            vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]
        );
    }
}
