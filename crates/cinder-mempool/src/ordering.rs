//! Transaction ordering by gas price.

use cinder_types::{Address, U256};
use std::cmp::Ordering;

/// Ordering key for the miner's highest-price-first interleaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceOrdering {
    /// Offered gas price.
    pub gas_price: U256,
    /// Pool arrival sequence, for deterministic ties.
    pub arrival: u64,
    /// Sender whose queue the transaction heads.
    pub sender: Address,
}

impl PriceOrdering {
    pub fn new(gas_price: U256, arrival: u64, sender: Address) -> Self {
        Self {
            gas_price,
            arrival,
            sender,
        }
    }
}

impl PartialOrd for PriceOrdering {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceOrdering {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher price wins; earlier arrival breaks ties
        self.gas_price
            .cmp(&other.gas_price)
            .then_with(|| other.arrival.cmp(&self.arrival))
            .then_with(|| other.sender.cmp(&self.sender))
    }
}
