//! Atomic write batches.
//!
//! Every multi-record write in the simulator rides a batch: a block commit
//! stages its transactions, receipts, log record, the block itself, the
//! latest pointer and the trie nodes behind the new state root in one
//! batch, and a revert stages one batch per unwound block. The backend
//! applies a batch in full or not at all, so a failed commit never leaves a
//! partially written block behind.

use crate::ColumnFamily;

/// One staged write.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Store `value` under `key`.
    Put {
        cf: ColumnFamily,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Remove `key`.
    Delete { cf: ColumnFamily, key: Vec<u8> },
}

impl BatchOp {
    pub fn keyspace(&self) -> ColumnFamily {
        match self {
            BatchOp::Put { cf, .. } | BatchOp::Delete { cf, .. } => *cf,
        }
    }
}

/// An ordered set of writes applied atomically.
///
/// Operations are kept in staging order; a later write to the same key
/// shadows an earlier one when the batch lands.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put.
    pub fn put(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            cf,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Stage a delete.
    pub fn delete(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete {
            cf,
            key: key.into(),
        });
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch in staging order.
    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
