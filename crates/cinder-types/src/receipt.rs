//! Transaction receipts and per-block log records.

use crate::{keccak, Address, Gas, H256};
use rlp::{DecoderError, Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// A log emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Log {
    /// Address that emitted the log.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<H256>,
    /// Opaque payload.
    pub data: Vec<u8>,
}

/// Execution receipt for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// 1 for success, 0 for a reverted execution.
    pub status: u64,
    /// Gas consumed by this transaction alone.
    pub gas_used: Gas,
    /// Gas consumed by the block up to and including this transaction.
    pub cumulative_gas_used: Gas,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Serialize the receipt. With `with_full_logs` the log payloads are
    /// embedded; otherwise each log is replaced by the hash of its encoding.
    pub fn serialize(&self, with_full_logs: bool) -> Vec<u8> {
        if with_full_logs {
            return rlp::encode(self).to_vec();
        }
        let mut stream = RlpStream::new_list(5);
        self.append_scalar_fields(&mut stream);
        stream.begin_list(self.logs.len());
        for log in &self.logs {
            stream.append(&keccak(rlp::encode(log)));
        }
        stream.out().to_vec()
    }

    /// Parse a receipt serialized with full logs.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(bytes)
    }

    fn append_scalar_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.status)
            .append(&self.gas_used)
            .append(&self.cumulative_gas_used);
        match &self.contract_address {
            Some(addr) => stream.append(addr),
            None => stream.append_empty_data(),
        };
    }
}

impl rlp::Encodable for Receipt {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(5);
        self.append_scalar_fields(stream);
        stream.append_list(&self.logs);
    }
}

impl rlp::Decodable for Receipt {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 5 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let contract_item = rlp.at(3)?;
        let contract_address = if contract_item.is_empty() {
            None
        } else {
            Some(contract_item.as_val()?)
        };
        Ok(Self {
            status: rlp.val_at(0)?,
            gas_used: rlp.val_at(1)?,
            cumulative_gas_used: rlp.val_at(2)?,
            contract_address,
            logs: rlp.list_at(4)?,
        })
    }
}

/// A single entry in a block's log record.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct LogEntry {
    /// Position of the emitting transaction within its block.
    pub tx_index: u64,
    /// Hash of the emitting transaction.
    pub tx_hash: H256,
    /// The log itself.
    pub log: Log,
}

/// All logs emitted by a block, persisted as one record keyed by number.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockLogs {
    /// Number of the block the logs belong to.
    pub block_number: u64,
    /// Log entries in transaction order.
    pub entries: Vec<LogEntry>,
}

impl BlockLogs {
    /// Append a log emitted by the transaction at `tx_index`.
    pub fn push(&mut self, tx_index: u64, tx_hash: H256, log: Log) {
        self.entries.push(LogEntry {
            tx_index,
            tx_hash,
            log,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> Log {
        Log {
            address: Address::repeat_byte(0x01),
            topics: vec![H256::repeat_byte(0x02), H256::repeat_byte(0x03)],
            data: vec![1, 2, 3, 4],
        }
    }

    fn sample_receipt() -> Receipt {
        Receipt {
            status: 1,
            gas_used: 21_000,
            cumulative_gas_used: 42_000,
            contract_address: None,
            logs: vec![sample_log()],
        }
    }

    #[test]
    fn receipt_serialize_deserialize_identity() {
        let receipt = sample_receipt();
        let bytes = receipt.serialize(true);
        let decoded = Receipt::deserialize(&bytes).unwrap();
        assert_eq!(decoded, receipt);
        assert_eq!(decoded.serialize(true), bytes);
    }

    #[test]
    fn receipt_without_full_logs_differs() {
        let receipt = sample_receipt();
        assert_ne!(receipt.serialize(false), receipt.serialize(true));
    }

    #[test]
    fn receipt_with_contract_address() {
        let receipt = Receipt {
            contract_address: Some(Address::repeat_byte(0xcc)),
            ..sample_receipt()
        };
        let decoded = Receipt::deserialize(&receipt.serialize(true)).unwrap();
        assert_eq!(decoded.contract_address, receipt.contract_address);
    }

    #[test]
    fn block_logs_round_trip() {
        let mut logs = BlockLogs {
            block_number: 9,
            entries: Vec::new(),
        };
        logs.push(0, H256::repeat_byte(0x0a), sample_log());
        logs.push(1, H256::repeat_byte(0x0b), sample_log());

        let decoded: BlockLogs = rlp::decode(&rlp::encode(&logs)).unwrap();
        assert_eq!(decoded, logs);
    }
}
