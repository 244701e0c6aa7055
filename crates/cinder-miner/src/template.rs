//! Next-block template.

use cinder_types::{Address, BlockHeader, Gas, H256};

/// The header-shaped template the coordinator prepares from the latest
/// block before asking the miner to fill it.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    /// Hash of the block being extended.
    pub parent_hash: H256,
    /// Number the mined block will carry.
    pub number: u64,
    /// Account credited with the block's fees.
    pub coinbase: Address,
    /// Timestamp for the mined block.
    pub timestamp: u64,
    /// Block gas ceiling.
    pub gas_limit: Gas,
}

impl BlockTemplate {
    /// Template extending `parent` at `timestamp`.
    pub fn next(parent: &BlockHeader, coinbase: Address, timestamp: u64, gas_limit: Gas) -> Self {
        Self {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            coinbase,
            timestamp,
            gas_limit,
        }
    }
}
