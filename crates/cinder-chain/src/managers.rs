//! Typed managers over the storage keyspaces.
//!
//! Managers borrow a keyspace from the shared store; they do not own
//! storage. Writes go through [`WriteBatch`]es so multi-record updates
//! commit atomically with the block that produced them.

use crate::{ChainError, ChainResult};
use cinder_evm::AccountState;
use cinder_storage::{ColumnFamily, Storage, WriteBatch};
use cinder_types::{Account, Address, Block, BlockHeader, BlockLogs, Receipt, StoredTransaction, H256, U256};
use parking_lot::Mutex;
use std::sync::Arc;

/// Metadata key holding the latest block number.
const LATEST_KEY: &[u8] = b"latest";

fn number_key(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

/// Blocks by number, with a hash index and the latest pointer.
#[derive(Clone)]
pub struct BlockManager {
    storage: Arc<dyn Storage>,
}

impl BlockManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Stage a block under its number and index its hash.
    pub fn put(&self, batch: &mut WriteBatch, block: &Block) {
        let key = number_key(block.number());
        batch.put(ColumnFamily::Blocks, key.as_slice(), rlp::encode(block).to_vec());
        batch.put(
            ColumnFamily::BlockHashIndex,
            block.hash().as_bytes(),
            key.as_slice(),
        );
    }

    /// Stage removal of a block and its hash index entry.
    pub fn delete(&self, batch: &mut WriteBatch, block: &Block) {
        batch.delete(ColumnFamily::Blocks, number_key(block.number()).as_slice());
        batch.delete(ColumnFamily::BlockHashIndex, block.hash().as_bytes());
    }

    pub fn get_by_number(&self, number: u64) -> ChainResult<Option<Block>> {
        match self
            .storage
            .get(ColumnFamily::Blocks, number_key(number).as_slice())?
        {
            Some(encoded) => Ok(Some(
                rlp::decode(&encoded).map_err(ChainError::CorruptRecord)?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_by_hash(&self, hash: &H256) -> ChainResult<Option<Block>> {
        match self
            .storage
            .get(ColumnFamily::BlockHashIndex, hash.as_bytes())?
        {
            Some(key) => match self.storage.get(ColumnFamily::Blocks, &key)? {
                Some(encoded) => Ok(Some(
                    rlp::decode(&encoded).map_err(ChainError::CorruptRecord)?,
                )),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub fn get_header(&self, number: u64) -> ChainResult<Option<BlockHeader>> {
        Ok(self.get_by_number(number)?.map(|block| block.header))
    }

    /// The persisted latest pointer, if any chain exists.
    pub fn latest_number(&self) -> ChainResult<Option<u64>> {
        match self.storage.get(ColumnFamily::Metadata, LATEST_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    ChainError::CorruptRecord(rlp::DecoderError::Custom("bad latest pointer"))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Stage an update of the latest pointer.
    pub fn set_latest(&self, batch: &mut WriteBatch, number: u64) {
        batch.put(
            ColumnFamily::Metadata,
            LATEST_KEY,
            number_key(number).as_slice(),
        );
    }
}

/// Per-block log records keyed by block number.
#[derive(Clone)]
pub struct BlockLogsManager {
    storage: Arc<dyn Storage>,
}

impl BlockLogsManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn put(&self, batch: &mut WriteBatch, logs: &BlockLogs) {
        batch.put(
            ColumnFamily::BlockLogs,
            number_key(logs.block_number).as_slice(),
            rlp::encode(logs).to_vec(),
        );
    }

    pub fn delete(&self, batch: &mut WriteBatch, number: u64) {
        batch.delete(ColumnFamily::BlockLogs, number_key(number).as_slice());
    }

    pub fn get(&self, number: u64) -> ChainResult<Option<BlockLogs>> {
        match self
            .storage
            .get(ColumnFamily::BlockLogs, number_key(number).as_slice())?
        {
            Some(encoded) => Ok(Some(
                rlp::decode(&encoded).map_err(ChainError::CorruptRecord)?,
            )),
            None => Ok(None),
        }
    }
}

/// Stored transactions keyed by transaction hash.
#[derive(Clone)]
pub struct TransactionManager {
    storage: Arc<dyn Storage>,
}

impl TransactionManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn put(&self, batch: &mut WriteBatch, stored: &StoredTransaction) {
        batch.put(
            ColumnFamily::Transactions,
            stored.tx.hash().as_bytes(),
            rlp::encode(stored).to_vec(),
        );
    }

    pub fn delete(&self, batch: &mut WriteBatch, hash: &H256) {
        batch.delete(ColumnFamily::Transactions, hash.as_bytes());
    }

    pub fn get(&self, hash: &H256) -> ChainResult<Option<StoredTransaction>> {
        match self.storage.get(ColumnFamily::Transactions, hash.as_bytes())? {
            Some(encoded) => Ok(Some(
                rlp::decode(&encoded).map_err(ChainError::CorruptRecord)?,
            )),
            None => Ok(None),
        }
    }
}

/// Receipts keyed by transaction hash, serialized with full logs.
#[derive(Clone)]
pub struct ReceiptManager {
    storage: Arc<dyn Storage>,
}

impl ReceiptManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn put(&self, batch: &mut WriteBatch, hash: &H256, receipt: &Receipt) {
        batch.put(
            ColumnFamily::Receipts,
            hash.as_bytes(),
            receipt.serialize(true),
        );
    }

    pub fn delete(&self, batch: &mut WriteBatch, hash: &H256) {
        batch.delete(ColumnFamily::Receipts, hash.as_bytes());
    }

    pub fn get(&self, hash: &H256) -> ChainResult<Option<Receipt>> {
        match self.storage.get(ColumnFamily::Receipts, hash.as_bytes())? {
            Some(encoded) => Ok(Some(
                Receipt::deserialize(&encoded).map_err(ChainError::CorruptRecord)?,
            )),
            None => Ok(None),
        }
    }
}

/// Account reads against the authoritative state.
#[derive(Clone)]
pub struct AccountManager {
    state: Arc<Mutex<AccountState>>,
}

impl AccountManager {
    pub fn new(state: Arc<Mutex<AccountState>>) -> Self {
        Self { state }
    }

    pub fn get_account(&self, address: &Address) -> ChainResult<Option<Account>> {
        Ok(self.state.lock().get_account(address)?)
    }

    pub fn balance(&self, address: &Address) -> ChainResult<U256> {
        Ok(self.state.lock().balance(address)?)
    }

    pub fn nonce(&self, address: &Address) -> ChainResult<u64> {
        Ok(self.state.lock().nonce(address)?)
    }
}
