//! # cinder-mempool
//!
//! Pending-transaction pool for the Cinder simulator.
//!
//! This crate provides:
//! - Per-sender, nonce-ordered transaction queues
//! - Admission validation against the account state
//! - The executable/future split and promotion between them
//! - Gas-price ordering for the miner's interleaving
//! - The `drain` notification consumed by the mining loop

mod error;
mod ordering;
mod pool;

pub use error::{MempoolError, MempoolResult};
pub use ordering::PriceOrdering;
pub use pool::{PoolConfig, PooledTransaction, SenderQueue, TxPool};

/// Default maximum number of pooled transactions.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 4096;
