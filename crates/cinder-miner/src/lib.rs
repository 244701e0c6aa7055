//! # cinder-miner
//!
//! Block production for the Cinder simulator.
//!
//! The miner is a pure consumer: given the pool's executable runs and a
//! next-block template, it selects a nonce-ordered interleaving across
//! senders by highest gas price first, executes each transaction against
//! the world state, and returns the assembled block data together with the
//! per-transaction failures it skipped over.

mod error;
mod miner;
mod template;

pub use error::{MinerError, MinerResult};
pub use miner::{MinedBlock, Miner, TxFailure};
pub use template::BlockTemplate;

/// Mine as many transactions as fit.
pub const MINE_ALL: i64 = -1;
