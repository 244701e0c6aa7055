//! Blocks and block headers.

use crate::{keccak, Address, Gas, Transaction, H256};
use once_cell::sync::OnceCell;
use rlp::{DecoderError, Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockHeader {
    /// Hash of the parent block's header.
    pub parent_hash: H256,
    /// Block number; the genesis block is 0.
    pub number: u64,
    /// Account credited with the block's fees.
    pub coinbase: Address,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Block gas ceiling.
    pub gas_limit: Gas,
    /// Gas consumed by the block's transactions.
    pub gas_used: Gas,
    /// State trie root after applying the block.
    pub state_root: H256,
    /// Trie root of the block's transactions indexed by position.
    pub transactions_trie: H256,
    /// Trie root of the block's receipts indexed by position.
    pub receipt_trie: H256,
}

impl BlockHeader {
    /// Header hash: `keccak256(rlp(header))`.
    pub fn hash(&self) -> H256 {
        keccak(rlp::encode(self))
    }
}

/// A header plus its transaction list; the unit of chain advance.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    cached_hash: OnceCell<H256>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            cached_hash: OnceCell::new(),
        }
    }

    /// Block hash (the header hash), computed once.
    pub fn hash(&self) -> H256 {
        *self.cached_hash.get_or_init(|| self.header.hash())
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> H256 {
        self.header.parent_hash
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.transactions == other.transactions
    }
}

impl Eq for Block {}

impl rlp::Encodable for Block {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(2);
        stream.append(&self.header);
        stream.append_list(&self.transactions);
    }
}

impl rlp::Decodable for Block {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self::new(rlp.val_at(0)?, rlp.list_at(1)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UnsignedTransaction, EMPTY_TRIE_ROOT, U256};

    fn sample_header(number: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: H256::repeat_byte(0x01),
            number,
            coinbase: Address::repeat_byte(0x02),
            timestamp: 1_577_836_800,
            gas_limit: 6_000_000,
            gas_used: 0,
            state_root: EMPTY_TRIE_ROOT,
            transactions_trie: EMPTY_TRIE_ROOT,
            receipt_trie: EMPTY_TRIE_ROOT,
        }
    }

    #[test]
    fn header_hash_is_stable() {
        let header = sample_header(1);
        assert_eq!(header.hash(), header.clone().hash());
        let mut other = sample_header(1);
        other.timestamp += 1;
        assert_ne!(header.hash(), other.hash());
    }

    #[test]
    fn block_rlp_round_trip() {
        let secret = libsecp256k1::SecretKey::parse(&[7u8; 32]).unwrap();
        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0xaa)),
            value: U256::from(5u64),
            data: Vec::new(),
        }
        .sign(&secret);

        let block = Block::new(sample_header(3), vec![tx]);
        let encoded = rlp::encode(&block);
        let decoded: Block = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(rlp::encode(&decoded), encoded);
    }
}
